//! Pipeline orchestrator.
//!
//! `Received → Cleaning → Extracting → Embedding → (Deduplicating) → Storing → Done`
//!
//! Any stage failure stops the run and is reported with the stage it happened
//! in. Nothing is written before `Storing`, and storing is a single
//! transaction, so a failed run leaves no rows behind. No stage is retried.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{cleanup, dedup, embed, extract, search};
use crate::config::PipelineConfig;
use crate::error::{IngestError, PipelineFailure, Result, Stage};
use crate::traits::gateway::LlmGateway;
use crate::traits::store::Store;
use crate::types::{
    ids::RecipeId,
    recipe::{NewRecipe, Recipe, ValidatedRecipe},
    search::SearchHit,
};

/// One ingestion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub raw_input: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub enforce_deduplication: bool,
    /// Marks the stored recipe as test data
    #[serde(default)]
    pub is_test: bool,
}

impl IngestRequest {
    pub fn new(raw_input: impl Into<String>) -> Self {
        Self {
            raw_input: raw_input.into(),
            source_url: None,
            enforce_deduplication: false,
            is_test: false,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_deduplication(mut self, enforce: bool) -> Self {
        self.enforce_deduplication = enforce;
        self
    }

    pub fn as_test(mut self) -> Self {
        self.is_test = true;
        self
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub recipe_id: RecipeId,
    pub recipe: Recipe,
    /// True only when a new row set was committed
    pub created: bool,
}

/// The ingestion pipeline over a gateway and a store.
pub struct Pipeline<G: ?Sized, S: ?Sized> {
    gateway: Arc<G>,
    store: Arc<S>,
    config: PipelineConfig,
}

impl<G: ?Sized, S: ?Sized> Clone for Pipeline<G, S> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<G, S> Pipeline<G, S>
where
    G: LlmGateway + ?Sized,
    S: Store + ?Sized,
{
    pub fn new(gateway: Arc<G>, store: Arc<S>, config: PipelineConfig) -> Self {
        Self {
            gateway,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Run one request through every stage.
    #[instrument(
        skip(self, request),
        fields(
            input_len = request.raw_input.len(),
            dedupe = request.enforce_deduplication,
            is_test = request.is_test
        )
    )]
    pub async fn ingest(
        &self,
        request: &IngestRequest,
    ) -> std::result::Result<IngestOutcome, PipelineFailure> {
        let started = Instant::now();
        let gateway = self.gateway.as_ref();
        let store = self.store.as_ref();
        let config = &self.config;

        let raw_input = self.received(&request.raw_input)?;

        enter(Stage::Cleaning);
        let cleaned = cleanup::clean(gateway, raw_input, config)
            .await
            .map_err(|e| failure(Stage::Cleaning, e))?;

        enter(Stage::Extracting);
        let recipe = extract::extract(gateway, &cleaned, config)
            .await
            .map_err(|e| failure(Stage::Extracting, e))?;

        enter(Stage::Embedding);
        let embedding = embed::embed_recipe(gateway, &recipe, config)
            .await
            .map_err(|e| failure(Stage::Embedding, e))?;

        if request.enforce_deduplication {
            enter(Stage::Deduplicating);
            let duplicate = dedup::find_duplicate(gateway, store, &recipe, &embedding, config)
                .await
                .map_err(|e| failure(Stage::Deduplicating, e))?;

            if let Some(duplicate) = duplicate {
                let existing = store
                    .get_recipe(duplicate.recipe_id)
                    .await
                    .map_err(|e| failure(Stage::Deduplicating, e.into()))?;

                match existing {
                    Some(existing) => {
                        info!(
                            recipe_id = %existing.id,
                            similarity = duplicate.similarity,
                            created = false,
                            duration_ms = started.elapsed().as_millis(),
                            "Pipeline done"
                        );
                        return Ok(IngestOutcome {
                            recipe_id: existing.id,
                            recipe: existing,
                            created: false,
                        });
                    }
                    None => warn!(
                        recipe_id = %duplicate.recipe_id,
                        "Duplicate vanished before it could be returned; storing"
                    ),
                }
            }
        }

        enter(Stage::Storing);
        let new_recipe = NewRecipe {
            recipe,
            source_url: request.source_url.clone(),
            is_test: request.is_test,
            embedding_type: config.embedding_type.clone(),
            embedding,
        };
        let stored = store
            .store_recipe(&new_recipe)
            .await
            .map_err(|e| failure(Stage::Storing, e.into()))?;

        info!(
            recipe_id = %stored.id,
            created = true,
            duration_ms = started.elapsed().as_millis(),
            "Pipeline done"
        );
        Ok(IngestOutcome {
            recipe_id: stored.id,
            recipe: stored,
            created: true,
        })
    }

    /// Run only the cleanup stage. Nothing is stored.
    #[instrument(skip(self, raw_input), fields(input_len = raw_input.len()))]
    pub async fn cleanup_only(
        &self,
        raw_input: &str,
    ) -> std::result::Result<String, PipelineFailure> {
        let raw_input = self.received(raw_input)?;

        enter(Stage::Cleaning);
        cleanup::clean(self.gateway.as_ref(), raw_input, &self.config)
            .await
            .map_err(|e| failure(Stage::Cleaning, e))
    }

    /// Extract straight from raw text, without cleanup. Nothing is stored.
    #[instrument(skip(self, raw_input), fields(input_len = raw_input.len()))]
    pub async fn extract_only(
        &self,
        raw_input: &str,
    ) -> std::result::Result<ValidatedRecipe, PipelineFailure> {
        let raw_input = self.received(raw_input)?;

        enter(Stage::Extracting);
        extract::extract(self.gateway.as_ref(), raw_input, &self.config)
            .await
            .map_err(|e| failure(Stage::Extracting, e))
    }

    /// Trimmed raw input, or `InvalidInput` at `Received` when it is too short.
    fn received<'a>(&self, raw_input: &'a str) -> std::result::Result<&'a str, PipelineFailure> {
        enter(Stage::Received);
        let raw_input = raw_input.trim();
        let raw_len = raw_input.chars().count();
        if raw_len < self.config.min_raw_input_chars {
            return Err(failure(
                Stage::Received,
                IngestError::invalid_input(format!(
                    "raw input must be at least {} characters, got {}",
                    self.config.min_raw_input_chars, raw_len
                )),
            ));
        }
        Ok(raw_input)
    }

    /// Semantic search with this pipeline's gateway, store and config.
    pub async fn search(&self, query: &str, limit: Option<i64>) -> Result<Vec<SearchHit>> {
        search::semantic_search(
            self.gateway.as_ref(),
            self.store.as_ref(),
            query,
            limit,
            &self.config,
        )
        .await
    }
}

fn enter(stage: Stage) {
    debug!(state = %stage, "Pipeline state");
}

fn failure(stage: Stage, error: IngestError) -> PipelineFailure {
    warn!(stage = %stage, kind = ?error.kind(), error = %error, "Pipeline failed");
    PipelineFailure::new(stage, error)
}
