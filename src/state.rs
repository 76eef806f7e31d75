use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;

/// Shared application state: one connection pool and the immutable config.
/// The database is the only mutable state shared between requests.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn connect(config: AppConfig, database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
            .connect(database_url)
            .await?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    /// Build state around an existing pool (used by tests).
    pub fn with_pool(config: AppConfig, pool: PgPool) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}
