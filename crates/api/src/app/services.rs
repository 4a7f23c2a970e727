//! Store wiring: one backend shared by the resolver and the admin facade.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use navgate_infra::{
    InMemoryPermissionStore, PermissionAdmin, PermissionResolver, PermissionStore,
    PostgresPermissionStore,
};

use crate::config::AppConfig;

/// Type-erased backend so handlers do not care which store is wired in.
pub type SharedStore = Arc<dyn PermissionStore>;

#[derive(Clone)]
pub struct AppServices {
    pub resolver: PermissionResolver<SharedStore>,
    pub admin: PermissionAdmin<SharedStore>,
    backend: &'static str,
}

impl AppServices {
    pub fn new(store: SharedStore, backend: &'static str) -> Self {
        Self {
            resolver: PermissionResolver::new(store.clone()),
            admin: PermissionAdmin::new(store),
            backend,
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPermissionStore::new()), "in_memory")
    }

    /// Postgres wiring; creates the schema if needed.
    pub async fn persistent(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;

        let store = PostgresPermissionStore::new(pool);
        store
            .ensure_schema()
            .await
            .context("failed to apply navigation schema")?;

        Ok(Self::new(Arc::new(store), "postgres"))
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let services = match (&config.database_url, config.use_persistent_stores) {
        (Some(url), true) => AppServices::persistent(url, config.database_max_connections).await?,
        _ => AppServices::in_memory(),
    };
    info!(backend = services.backend(), "permission store ready");
    Ok(services)
}
