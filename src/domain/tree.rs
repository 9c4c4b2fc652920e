//! Message tree algorithms.
//!
//! A session's messages form a forest through `parent_message_id`. The
//! `is_active` flags mark at most one root-to-leaf path, which is the
//! conversation the user currently sees. Everything here is pure and works
//! on rows already loaded from storage.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::chat::ChatMessage;
use crate::errors::{AppError, AppResult};

/// In-memory tree node owning its children in sibling order
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageNode {
    pub message: ChatMessage,
    pub children: Vec<MessageNode>,
}

/// A message with more than one child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BranchPoint {
    pub message_id: Uuid,
    /// Children in sibling order
    pub child_ids: Vec<Uuid>,
    pub active_child_id: Option<Uuid>,
}

/// Where a new message lands among its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub order_index: i32,
    pub is_active: bool,
}

/// Sibling order: `order_index`, then `timestamp`, then `id`.
pub fn sibling_order(a: &ChatMessage, b: &ChatMessage) -> Ordering {
    a.order_index
        .cmp(&b.order_index)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
        .then_with(|| a.id.cmp(&b.id))
}

/// Rebuild the forest for one session.
///
/// Messages whose parent is missing from the set are promoted to roots so
/// that every row appears exactly once.
pub fn build_forest(messages: Vec<ChatMessage>) -> Vec<MessageNode> {
    let known: HashSet<Uuid> = messages.iter().map(|m| m.id).collect();

    let mut children: HashMap<Option<Uuid>, Vec<ChatMessage>> = HashMap::new();
    for message in messages {
        let parent = message.parent_message_id.filter(|p| known.contains(p));
        children.entry(parent).or_default().push(message);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(sibling_order);
    }

    attach(&mut children)
}

/// Build nodes bottom-up with an explicit stack; conversation depth is not
/// bounded by the thread stack.
fn attach(children: &mut HashMap<Option<Uuid>, Vec<ChatMessage>>) -> Vec<MessageNode> {
    struct Frame {
        message: Option<ChatMessage>,
        pending: std::vec::IntoIter<ChatMessage>,
        built: Vec<MessageNode>,
    }

    let roots = children.remove(&None).unwrap_or_default();
    let mut stack = vec![Frame {
        message: None,
        pending: roots.into_iter(),
        built: Vec::new(),
    }];

    while let Some(frame) = stack.last_mut() {
        if let Some(message) = frame.pending.next() {
            let kids = children.remove(&Some(message.id)).unwrap_or_default();
            stack.push(Frame {
                message: Some(message),
                pending: kids.into_iter(),
                built: Vec::new(),
            });
            continue;
        }

        let Some(done) = stack.pop() else { break };
        match (done.message, stack.last_mut()) {
            (Some(message), Some(parent)) => parent.built.push(MessageNode {
                message,
                children: done.built,
            }),
            _ => return done.built,
        }
    }

    Vec::new()
}

/// Follow active flags from the first active root down to the first node
/// without an active child.
pub fn active_path(forest: &[MessageNode]) -> Vec<ChatMessage> {
    let mut path = Vec::new();
    let mut current = forest.iter().find(|n| n.message.is_active);

    while let Some(node) = current {
        path.push(node.message.clone());
        current = node.children.iter().find(|c| c.message.is_active);
    }

    path
}

/// Root-to-target path found by depth-first search, if the target exists.
pub fn path_to(forest: &[MessageNode], target: Uuid) -> Option<Vec<ChatMessage>> {
    let mut stack: Vec<(&MessageNode, usize)> = forest.iter().rev().map(|n| (n, 0)).collect();
    let mut path: Vec<&MessageNode> = Vec::new();

    while let Some((node, depth)) = stack.pop() {
        path.truncate(depth);
        path.push(node);

        if node.message.id == target {
            return Some(path.iter().map(|n| n.message.clone()).collect());
        }

        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }

    None
}

/// Every node with more than one child, in depth-first order.
pub fn branch_points(forest: &[MessageNode]) -> Vec<BranchPoint> {
    let mut points = Vec::new();
    let mut stack: Vec<&MessageNode> = forest.iter().rev().collect();

    while let Some(node) = stack.pop() {
        if node.children.len() > 1 {
            points.push(BranchPoint {
                message_id: node.message.id,
                child_ids: node.children.iter().map(|c| c.message.id).collect(),
                active_child_id: node
                    .children
                    .iter()
                    .find(|c| c.message.is_active)
                    .map(|c| c.message.id),
            });
        }
        stack.extend(node.children.iter().rev());
    }

    points
}

/// Total number of nodes in the forest.
pub fn count_nodes(forest: &[MessageNode]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&MessageNode> = forest.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

/// Last node of the active path.
pub fn active_leaf(messages: &[ChatMessage]) -> Option<Uuid> {
    active_path(&build_forest(messages.to_vec()))
        .last()
        .map(|m| m.id)
}

/// Decide the order index and active flag of a message about to be added
/// under `parent`.
///
/// The index is one past the largest sibling index (0 for a first child).
/// The node is active only if it extends the active path: its parent is the
/// active leaf, or it is a root and no active root exists yet. This keeps a
/// single active path no matter where a fork is made.
///
/// # Errors
/// `NotFound` if `parent` is not one of `messages`.
pub fn placement(messages: &[ChatMessage], parent: Option<Uuid>) -> AppResult<Placement> {
    let parent_active = match parent {
        Some(parent_id) => {
            messages
                .iter()
                .find(|m| m.id == parent_id)
                .ok_or(AppError::NotFound)?
                .is_active
        }
        None => true,
    };

    let siblings = messages.iter().filter(|m| m.parent_message_id == parent);
    let (max_index, sibling_active) = siblings.fold((None, false), |(max, active), m| {
        (
            Some(max.map_or(m.order_index, |x: i32| x.max(m.order_index))),
            active || m.is_active,
        )
    });

    Ok(Placement {
        order_index: max_index.map_or(0, |i| i + 1),
        is_active: parent_active && !sibling_active,
    })
}

/// Ids that must carry the active flag after switching to `target`.
///
/// # Errors
/// `NotFound` if `target` is not one of `messages`.
pub fn activation_set(messages: &[ChatMessage], target: Uuid) -> AppResult<Vec<Uuid>> {
    let forest = build_forest(messages.to_vec());
    let path = path_to(&forest, target).ok_or(AppError::NotFound)?;
    Ok(path.into_iter().map(|m| m.id).collect())
}

/// Apply an activation set to loaded rows, as the storage update does.
pub fn apply_activation(messages: &mut [ChatMessage], path: &[Uuid]) {
    let on_path: HashSet<&Uuid> = path.iter().collect();
    for message in messages.iter_mut() {
        message.is_active = on_path.contains(&message.id);
    }
}

/// Ids of `root` and all of its descendants.
pub fn subtree_ids(messages: &[ChatMessage], root: Uuid) -> Vec<Uuid> {
    let mut by_parent: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for message in messages {
        if let Some(parent) = message.parent_message_id {
            by_parent.entry(parent).or_default().push(message.id);
        }
    }

    if !messages.iter().any(|m| m.id == root) {
        return Vec::new();
    }

    let mut ids = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        ids.push(id);
        if let Some(kids) = by_parent.get(&id) {
            stack.extend(kids.iter().copied());
        }
    }
    ids
}
