//! Semantic search over stored recipe embeddings.

use std::cmp::Ordering;

use tracing::{debug, instrument};

use super::{embed::embed_text, rerank::rerank};
use crate::config::{PipelineConfig, SearchConfig};
use crate::error::{IngestError, Result, Stage};
use crate::traits::gateway::LlmGateway;
use crate::traits::store::RecipeStore;
use crate::types::search::{EmbeddingMatch, SearchHit};

/// Collapse whitespace and drop one pair of wrapping quotes.
pub fn normalize_query(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut chars = collapsed.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && (first == '"' || first == '\'') => {
            chars.as_str().split_whitespace().collect::<Vec<_>>().join(" ")
        }
        _ => collapsed,
    }
}

/// Reject queries with fewer than `min_query_chars` non-whitespace characters.
pub fn validate_query(query: &str, config: &SearchConfig) -> Result<()> {
    let meaningful = query.chars().filter(|c| !c.is_whitespace()).count();
    if meaningful < config.min_query_chars {
        return Err(IngestError::invalid_input(format!(
            "query must contain at least {} non-whitespace characters",
            config.min_query_chars
        )));
    }
    Ok(())
}

/// Similarity descending; ties go to the most recently created recipe.
pub fn rank_by_similarity(matches: Vec<EmbeddingMatch>) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = matches.into_iter().map(SearchHit::from).collect();
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    hits
}

/// Rank stored recipes against `query`, returning at most the clamped `limit`.
#[instrument(skip(gateway, store, config))]
pub async fn semantic_search<G, S>(
    gateway: &G,
    store: &S,
    query: &str,
    limit: Option<i64>,
    config: &PipelineConfig,
) -> Result<Vec<SearchHit>>
where
    G: LlmGateway + ?Sized,
    S: RecipeStore + ?Sized,
{
    let query = normalize_query(query);
    validate_query(&query, &config.search)?;
    let limit = config.search.clamp_limit(limit);

    let vector = embed_text(gateway, &query, config)
        .await
        .map_err(|source| IngestError::UpstreamUnavailable {
            stage: Stage::Searching,
            source,
        })?;

    let fetch = if config.search.rerank_enabled {
        (limit * config.search.rerank_candidate_multiplier).min(config.search.max_limit)
    } else {
        limit
    };
    let matches = store
        .nearest_embeddings(&vector, &config.embedding_type, fetch)
        .await?;
    let mut hits = rank_by_similarity(matches);

    if config.search.rerank_enabled {
        hits = rerank(gateway, store, &query, hits, limit, config).await;
    } else {
        hits.truncate(limit);
    }

    debug!(results = hits.len(), "Semantic search completed");
    Ok(hits)
}
