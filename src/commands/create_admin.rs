//! Create-admin command - Provisions an admin that can sign in immediately.

use std::sync::Arc;

use crate::cli::args::CreateAdminArgs;
use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Database, Persistence};
use crate::services::provision_admin;

/// Execute the create-admin command
pub async fn execute(args: CreateAdminArgs, config: Config) -> AppResult<()> {
    let db = Database::connect(&config).await?;
    let uow = Arc::new(Persistence::new(db.get_connection()));

    let user = provision_admin(uow.as_ref(), &args.name, &args.email, &args.password).await?;

    println!("Admin created: {} <{}> ({})", user.name, user.email, user.id);
    Ok(())
}
