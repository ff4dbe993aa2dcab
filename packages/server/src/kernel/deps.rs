//! Server dependencies (using traits for testability)
//!
//! The central dependency container: the pool, the gateway and the store that
//! every `RecipeService` call goes through. Tests build it from mocks with
//! [`ServerDeps::new`]; the binary uses [`ServerDeps::from_config`].

use anyhow::Result;
use recipe_ingestion::{CachedGateway, LlmGateway, PipelineConfig, PostgresStore, Store};
use std::sync::Arc;
use tracing::info;

use super::{database::Database, llm_gateway::OpenAiGateway};
use crate::config::Config;
use crate::service::RecipeService;

#[derive(Clone)]
pub struct ServerDeps {
    pub db: Database,
    pub gateway: Arc<dyn LlmGateway>,
    pub store: Arc<dyn Store>,
    pub pipeline_config: PipelineConfig,
}

impl ServerDeps {
    pub fn new(
        db: Database,
        gateway: Arc<dyn LlmGateway>,
        store: Arc<dyn Store>,
        pipeline_config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            store,
            pipeline_config,
        }
    }

    /// Connect the pool and build the production gateway and store.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::connect(&config.database).await?;

        let gateway = CachedGateway::with_limits(
            OpenAiGateway::new(&config.llm)?,
            config.cache_ttl,
            config.cache_max_items,
        );
        info!(
            model = %config.llm.model,
            embedding_model = %config.llm.embedding_model,
            cache_enabled = gateway.is_enabled(),
            "LLM gateway ready"
        );

        let store = PostgresStore::from_pool(db.pool().clone());

        Ok(Self::new(
            db,
            Arc::new(gateway),
            Arc::new(store),
            config.pipeline_config(),
        ))
    }

    pub fn recipe_service(&self) -> RecipeService {
        RecipeService::new(
            self.gateway.clone(),
            self.store.clone(),
            self.pipeline_config.clone(),
        )
    }

    pub async fn shutdown(&self) {
        self.db.close().await;
    }
}
