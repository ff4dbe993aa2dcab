//! Similarity matches and ranked search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RecipeId;

/// A stored embedding close to a query vector, as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatch {
    pub recipe_id: RecipeId,
    pub title: String,
    /// Cosine similarity, 1.0 = identical direction
    pub similarity: f32,
    pub recipe_created_at: DateTime<Utc>,
}

/// One ranked semantic search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: RecipeId,
    pub title: String,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

impl From<EmbeddingMatch> for SearchHit {
    fn from(m: EmbeddingMatch) -> Self {
        Self {
            id: m.recipe_id,
            title: m.title,
            similarity: m.similarity,
            rerank_score: None,
            combined_score: None,
            created_at: m.recipe_created_at,
        }
    }
}
