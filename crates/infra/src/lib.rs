//! Infrastructure layer: catalog and grant stores, resolver and admin services.

pub mod admin;
pub mod resolver;
pub mod store;

pub use admin::{AdminError, AdminResult, PermissionAdmin};
pub use resolver::PermissionResolver;
pub use store::{
    CatalogStore, GrantStore, InMemoryPermissionStore, PermissionStore, PermissionView,
    PostgresPermissionStore, UserGrantSet,
};
