//! Shared request and response types.

mod pagination;
mod response;

pub use pagination::{Paginated, PaginationMeta, PaginationParams};
pub use response::MessageResponse;
