//! Recipe Ingestion Library
//!
//! Turns arbitrary recipe text (pasted pages, OCR output, chat messages) into
//! stored, searchable recipes.
//!
//! # Pipeline
//!
//! `Received → Cleaning → Extracting → Embedding → (Deduplicating) → Storing`
//!
//! - Cleanup strips everything that is not the recipe
//! - Extraction produces a schema-validated recipe
//! - The title + ingredients embedding drives both dedup and search
//! - Storage writes the recipe, its children and its embedding in one transaction
//!
//! Every failure carries the stage it happened in.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use recipe_ingestion::{IngestRequest, MemoryStore, Pipeline, PipelineConfig};
//! use recipe_ingestion::testing::MockGateway;
//!
//! let pipeline = Pipeline::new(
//!     Arc::new(MockGateway::new()),
//!     Arc::new(MemoryStore::new()),
//!     PipelineConfig::default(),
//! );
//!
//! let outcome = pipeline
//!     .ingest(&IngestRequest::new(raw_text).with_deduplication(true))
//!     .await?;
//! let hits = pipeline.search("chocolate cookies", Some(5)).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Gateway and storage abstractions
//! - [`types`] - Recipes, books, search hits and typed ids
//! - [`pipeline`] - The stages, the orchestrator and semantic search
//! - [`cache`] - Response cache for any gateway
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`testing`] - Mock implementations for testing

pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use cache::CachedGateway;
pub use config::{DedupConfig, PipelineConfig, SearchConfig};
pub use error::{
    ErrorKind, GatewayError, GatewayResult, IngestError, PipelineFailure, Result, Stage,
    StoreError, StoreResult,
};
pub use traits::{
    gateway::{LlmGateway, StructuredSchema},
    store::{RecipeBookStore, RecipeStore, Store},
};
pub use types::{
    book::{BookStats, CreatedBook, RecipeBook, RecipeBookDetail},
    ids::{RecipeBookId, RecipeId},
    recipe::{
        Ingredient, Instruction, NewRecipe, Recipe, RecipeEmbedding, RecipeSummary,
        RecipeWithEmbeddings, ValidatedRecipe,
    },
    search::{EmbeddingMatch, SearchHit},
};

// Re-export pipeline components
pub use pipeline::{
    clean, embed_recipe, embedding_text, extract, find_duplicate, normalize_query,
    semantic_search, validate_extraction, DuplicateMatch, ExtractionOutcome, IngestOutcome,
    IngestRequest, Pipeline,
};

// Re-export stores
pub use stores::MemoryStore;
#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
