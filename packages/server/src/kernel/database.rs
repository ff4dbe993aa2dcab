//! Connection pool lifecycle: created once at startup, drained on shutdown.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the pool. Every connection gets the configured `statement_timeout`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let statement_timeout_ms = config.statement_timeout.as_millis();

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .acquire_timeout(config.acquire_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    let statement = format!("SET statement_timeout = {}", statement_timeout_ms);
                    sqlx::query(&statement).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect(&config.url)
            .await
            .context("Failed to connect to database")?;

        info!(
            max_connections = config.max_connections,
            statement_timeout_ms = statement_timeout_ms as u64,
            "Database connected"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        info!("Migrations complete");
        Ok(())
    }

    /// Wait for checked-out connections to return, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
