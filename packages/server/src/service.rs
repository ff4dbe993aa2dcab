//! The outward boundary: what a routing layer (or the CLI) calls.
//!
//! Every failure leaves here as a [`ServiceError`] carrying the stage (when a
//! pipeline run failed), the error kind and a short message.

use std::sync::Arc;

use recipe_ingestion::{
    types::book::normalize_book_name, BookStats, CreatedBook, ErrorKind, IngestError,
    IngestRequest, LlmGateway, Pipeline, PipelineConfig, PipelineFailure, Recipe, RecipeBook,
    RecipeBookDetail, RecipeBookId, RecipeBookStore, RecipeId, RecipeStore, RecipeSummary,
    RecipeWithEmbeddings, SearchHit, Stage, Store, StoreError, ValidatedRecipe,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 200;

/// Structured failure returned to callers; never an internal trace.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct ServiceError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            stage: None,
            kind: ErrorKind::InvalidInput,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self {
            stage: None,
            kind: ErrorKind::NotFound,
            message: format!("{entity} not found: {id}"),
        }
    }
}

impl From<PipelineFailure> for ServiceError {
    fn from(failure: PipelineFailure) -> Self {
        Self {
            stage: Some(failure.stage),
            kind: failure.kind(),
            message: failure.to_string(),
        }
    }
}

impl From<IngestError> for ServiceError {
    fn from(err: IngestError) -> Self {
        let stage = match &err {
            IngestError::UpstreamUnavailable { stage, .. } => Some(*stage),
            _ => None,
        };
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        IngestError::from(err).into()
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessAndStoreResponse {
    pub recipe_id: Option<RecipeId>,
    pub recipe: Option<Recipe>,
    pub created: bool,
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemanticSearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub error: Option<ServiceError>,
}

/// Cleanup output with character counts before and after.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    pub cleaned_text: String,
    pub source_url: Option<String>,
    pub original_length: usize,
    pub cleaned_length: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AddedResponse {
    pub added: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

/// Clamp a listing limit into `[1, MAX_LIST_LIMIT]`.
pub fn clamp_list_limit(limit: Option<i64>) -> usize {
    match limit {
        None => DEFAULT_LIST_LIMIT,
        Some(n) if n < 1 => 1,
        Some(n) => (n as usize).min(MAX_LIST_LIMIT),
    }
}

#[derive(Clone)]
pub struct RecipeService {
    pipeline: Pipeline<dyn LlmGateway, dyn Store>,
}

impl RecipeService {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        store: Arc<dyn Store>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            pipeline: Pipeline::new(gateway, store, config),
        }
    }

    fn store(&self) -> &dyn Store {
        self.pipeline.store().as_ref()
    }

    pub fn pipeline(&self) -> &Pipeline<dyn LlmGateway, dyn Store> {
        &self.pipeline
    }

    // =========================================================================
    // Recipes
    // =========================================================================

    #[instrument(skip(self, request), fields(dedupe = request.enforce_deduplication))]
    pub async fn process_and_store(&self, request: IngestRequest) -> ProcessAndStoreResponse {
        match self.pipeline.ingest(&request).await {
            Ok(outcome) => {
                info!(recipe_id = %outcome.recipe_id, created = outcome.created, "Recipe processed");
                ProcessAndStoreResponse {
                    recipe_id: Some(outcome.recipe_id),
                    recipe: Some(outcome.recipe),
                    created: outcome.created,
                    error: None,
                }
            }
            Err(failure) => ProcessAndStoreResponse {
                recipe_id: None,
                recipe: None,
                created: false,
                error: Some(failure.into()),
            },
        }
    }

    #[instrument(skip(self))]
    pub async fn semantic_search(&self, query: &str, limit: Option<i64>) -> SemanticSearchResponse {
        match self.pipeline.search(query, limit).await {
            Ok(results) => SemanticSearchResponse {
                query: query.to_string(),
                results,
                error: None,
            },
            Err(err) => SemanticSearchResponse {
                query: query.to_string(),
                results: Vec::new(),
                error: Some(err.into()),
            },
        }
    }

    /// Cleanup stage alone, for inspecting what extraction would see.
    #[instrument(skip(self, raw_text, source_url))]
    pub async fn cleanup(
        &self,
        raw_text: &str,
        source_url: Option<String>,
    ) -> ServiceResult<CleanupResponse> {
        let cleaned_text = self.pipeline.cleanup_only(raw_text).await?;
        Ok(CleanupResponse {
            original_length: raw_text.chars().count(),
            cleaned_length: cleaned_text.chars().count(),
            cleaned_text,
            source_url,
        })
    }

    /// Extract a recipe from raw text without cleaning or storing it.
    #[instrument(skip(self, raw_input))]
    pub async fn extract_only(&self, raw_input: &str) -> ServiceResult<ValidatedRecipe> {
        Ok(self.pipeline.extract_only(raw_input).await?)
    }

    pub async fn get_recipe(&self, id: RecipeId) -> ServiceResult<Recipe> {
        self.store()
            .get_recipe(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("recipe", id))
    }

    pub async fn get_recipe_with_embeddings(
        &self,
        id: RecipeId,
    ) -> ServiceResult<RecipeWithEmbeddings> {
        self.store()
            .get_recipe_with_embeddings(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("recipe", id))
    }

    pub async fn list_recipes(&self, limit: Option<i64>) -> ServiceResult<Vec<RecipeSummary>> {
        Ok(self.store().list_recipes(clamp_list_limit(limit)).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_recipe(&self, id: RecipeId) -> ServiceResult<DeletedResponse> {
        if !self.store().delete_recipe(id).await? {
            return Err(ServiceError::not_found("recipe", id));
        }
        info!(recipe_id = %id, "Recipe deleted");
        Ok(DeletedResponse { deleted: true })
    }

    // =========================================================================
    // Recipe books
    // =========================================================================

    #[instrument(skip(self, description))]
    pub async fn create_book(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<CreatedBook> {
        if normalize_book_name(name).is_empty() {
            return Err(ServiceError::invalid_input("recipe book name cannot be empty"));
        }
        Ok(self.store().create_book(name, description).await?)
    }

    pub async fn get_book(&self, id: RecipeBookId) -> ServiceResult<RecipeBookDetail> {
        self.store()
            .get_book(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("recipe book", id))
    }

    pub async fn get_book_by_name(&self, name: &str) -> ServiceResult<RecipeBookDetail> {
        self.store()
            .get_book_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::not_found("recipe book", name))
    }

    pub async fn list_books(&self, limit: Option<i64>) -> ServiceResult<Vec<RecipeBook>> {
        Ok(self.store().list_books(clamp_list_limit(limit)).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_book(&self, id: RecipeBookId) -> ServiceResult<DeletedResponse> {
        if !self.store().delete_book(id).await? {
            return Err(ServiceError::not_found("recipe book", id));
        }
        Ok(DeletedResponse { deleted: true })
    }

    #[instrument(skip(self))]
    pub async fn add_recipe_to_book(
        &self,
        book_id: RecipeBookId,
        recipe_id: RecipeId,
    ) -> ServiceResult<AddedResponse> {
        let added = self.store().add_recipe_to_book(book_id, recipe_id).await?;
        Ok(AddedResponse { added })
    }

    #[instrument(skip(self))]
    pub async fn remove_recipe_from_book(
        &self,
        book_id: RecipeBookId,
        recipe_id: RecipeId,
    ) -> ServiceResult<RemovedResponse> {
        let removed = self
            .store()
            .remove_recipe_from_book(book_id, recipe_id)
            .await?;
        Ok(RemovedResponse { removed })
    }

    pub async fn books_for_recipe(&self, recipe_id: RecipeId) -> ServiceResult<Vec<RecipeBook>> {
        if !self.store().recipe_exists(recipe_id).await? {
            return Err(ServiceError::not_found("recipe", recipe_id));
        }
        Ok(self.store().books_for_recipe(recipe_id).await?)
    }

    pub async fn book_stats(&self) -> ServiceResult<BookStats> {
        Ok(self.store().stats().await?)
    }
}
