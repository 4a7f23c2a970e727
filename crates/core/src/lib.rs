//! `navgate-core`: catalog and grant building blocks.
//!
//! This crate contains **pure data** primitives for the navigation catalog and
//! per-user grants (no storage, no policy, no IO).

pub mod catalog;
pub mod entity;
pub mod error;
pub mod grant;
pub mod id;
pub mod menu;
pub mod page;

pub use catalog::{Catalog, ChildIndex, RemovedSubtree};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use grant::{ActionGrant, NodeGrant, UserGrants};
pub use id::{ActionKey, NodeId, UserId};
pub use menu::{ActionPermission, MenuNode, MenuNodePatch, NewAction, NewMenuNode};
pub use page::{Page, PageRequest};
