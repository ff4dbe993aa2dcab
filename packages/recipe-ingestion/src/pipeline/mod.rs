//! The ingestion pipeline and semantic search.
//!
//! Stages, in order:
//! - [`cleanup`]: raw text to plain recipe text
//! - [`extract`]: plain text to a validated structured recipe
//! - [`embed`]: title + ingredients to a vector
//! - [`dedup`]: optional pre-storage duplicate gate
//! - storage: one transaction through the store
//!
//! [`orchestrator::Pipeline`] sequences them. [`search`] and [`rerank`] serve queries.

pub mod cleanup;
pub mod dedup;
pub mod embed;
pub mod extract;
pub mod orchestrator;
pub mod prompts;
pub mod rerank;
pub mod search;

pub use cleanup::clean;
pub use dedup::{find_duplicate, DedupChoice, DedupDecision, DuplicateMatch};
pub use embed::{embed_recipe, embedding_text};
pub use extract::{extract, validate_extraction, ExtractionOutcome, RecipeExtraction};
pub use orchestrator::{IngestOutcome, IngestRequest, Pipeline};
pub use rerank::{apply_rerank, RankedCandidate, RerankResponse};
pub use search::{normalize_query, semantic_search};

use std::future::Future;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

/// Run a gateway call under a timeout.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    after: Duration,
    call: F,
) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout { operation, after }),
    }
}
