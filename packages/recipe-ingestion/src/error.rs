//! Typed errors for the ingestion pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match on
//! the failing stage and map it onto their own response shapes.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failures reported by an [`LlmGateway`](crate::traits::gateway::LlmGateway).
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Provider unreachable, rejected the request, or returned no content
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within the configured timeout
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Provider answered, but not with something we can use (wrong vector size, bad JSON)
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

/// Failures reported by a recipe or recipe-book store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Driver or connection failure; for transactional writes, nothing was committed
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Row data that violates a schema constraint (blank book name, bad vector size)
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Deliberate failure from a test double
    #[error("injected failure at {0}")]
    Injected(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(Box::new(err))
    }
}

/// Pipeline stage, used to say where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Cleaning,
    Extracting,
    Embedding,
    Deduplicating,
    Storing,
    Searching,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Cleaning => "cleaning",
            Stage::Extracting => "extracting",
            Stage::Embedding => "embedding",
            Stage::Deduplicating => "deduplicating",
            Stage::Storing => "storing",
            Stage::Searching => "searching",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UpstreamUnavailable,
    ExtractionSchemaInvalid,
    StorageFailure,
    NotFound,
}

/// Errors produced by pipeline stages and the read/delete pass-throughs.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The cleanup model found no recipe-like content
    #[error("cleaned text too short ({length} chars, need {minimum})")]
    CleanupTooShort { length: usize, minimum: usize },

    #[error("{stage} gateway call failed: {source}")]
    UpstreamUnavailable {
        stage: Stage,
        #[source]
        source: GatewayError,
    },

    #[error("extraction returned an unusable structure: {detail}")]
    ExtractionSchemaInvalid { detail: String },

    #[error("embedding unavailable: {source}")]
    EmbeddingUnavailable {
        #[source]
        source: GatewayError,
    },

    #[error("storage failure: {0}")]
    StorageFailure(#[source] StoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl IngestError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::InvalidInput { .. } | IngestError::CleanupTooShort { .. } => {
                ErrorKind::InvalidInput
            }
            IngestError::UpstreamUnavailable { .. } | IngestError::EmbeddingUnavailable { .. } => {
                ErrorKind::UpstreamUnavailable
            }
            IngestError::ExtractionSchemaInvalid { .. } => ErrorKind::ExtractionSchemaInvalid,
            IngestError::StorageFailure(_) => ErrorKind::StorageFailure,
            IngestError::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => IngestError::NotFound { entity, id },
            other => IngestError::StorageFailure(other),
        }
    }
}

/// A pipeline run that stopped before `Done`.
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: IngestError,
}

impl PipelineFailure {
    pub fn new(stage: Stage, error: IngestError) -> Self {
        Self { stage, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Result type alias for stage and store-facing operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
