//! Optional LLM reranking of semantic search candidates.
//!
//! The gateway scores candidates against the query; scores below the floor are
//! dropped and the rest are ordered by a blend of rerank score and similarity.
//! When the gateway fails, or names none of the candidates, the similarity
//! order stands.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{bounded, prompts};
use crate::config::{PipelineConfig, SearchConfig};
use crate::traits::gateway::{LlmGateway, StructuredSchema};
use crate::traits::store::RecipeStore;
use crate::types::{ids::RecipeId, search::SearchHit};

pub const RERANK_SCHEMA_NAME: &str = "recipe_search_rerank";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RankedCandidate {
    /// Candidate id, as given in the prompt
    pub id: String,
    /// Relevance from 0.0 to 1.0
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RerankResponse {
    pub ranked: Vec<RankedCandidate>,
}

#[derive(Debug, Serialize)]
struct CandidatePayload<'a> {
    id: String,
    title: &'a str,
    similarity: f32,
    ingredients_preview: &'a [String],
}

#[derive(Debug, Serialize)]
struct RerankPayload<'a> {
    query: &'a str,
    max_results: usize,
    candidates: Vec<CandidatePayload<'a>>,
}

pub fn format_rerank_prompt(
    query: &str,
    hits: &[SearchHit],
    previews: &HashMap<RecipeId, Vec<String>>,
    max_results: usize,
) -> String {
    let payload = RerankPayload {
        query,
        max_results,
        candidates: hits
            .iter()
            .map(|hit| CandidatePayload {
                id: hit.id.to_string(),
                title: &hit.title,
                similarity: hit.similarity,
                ingredients_preview: previews.get(&hit.id).map(Vec::as_slice).unwrap_or(&[]),
            })
            .collect(),
    };
    serde_json::to_string(&payload).unwrap_or_default()
}

/// Merge gateway scores into similarity-ordered hits.
pub fn apply_rerank(
    hits: Vec<SearchHit>,
    ranked: &[RankedCandidate],
    limit: usize,
    config: &SearchConfig,
) -> Vec<SearchHit> {
    let min_score = config.rerank_min_score.clamp(0.0, 1.0);
    let weight = config.rerank_weight.clamp(0.0, 1.0);

    let mut by_id: HashMap<String, SearchHit> =
        hits.iter().map(|h| (h.id.to_string(), h.clone())).collect();
    let mut seen = HashSet::new();
    let mut any_known = false;
    let mut reranked = Vec::new();

    for candidate in ranked {
        let id = candidate.id.trim();
        if !seen.insert(id.to_string()) {
            continue;
        }
        let Some(mut hit) = by_id.remove(id) else {
            continue;
        };
        any_known = true;

        if !candidate.score.is_finite() || candidate.score < min_score {
            continue;
        }
        let score = candidate.score.min(1.0);
        let similarity = hit.similarity.clamp(0.0, 1.0);
        hit.rerank_score = Some(score);
        hit.combined_score = Some(weight * score + (1.0 - weight) * similarity);
        reranked.push(hit);
    }

    if !any_known {
        let mut hits = hits;
        hits.truncate(limit);
        return hits;
    }

    reranked.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    reranked.truncate(limit);
    reranked
}

/// Rerank `hits` for `query`, falling back to the incoming order on any failure.
#[instrument(skip_all, fields(query = %query, candidates = hits.len()))]
pub async fn rerank<G, S>(
    gateway: &G,
    store: &S,
    query: &str,
    hits: Vec<SearchHit>,
    limit: usize,
    config: &PipelineConfig,
) -> Vec<SearchHit>
where
    G: LlmGateway + ?Sized,
    S: RecipeStore + ?Sized,
{
    if hits.is_empty() {
        return hits;
    }

    let ids: Vec<RecipeId> = hits.iter().map(|h| h.id).collect();
    let previews = match store
        .ingredient_previews(&ids, config.search.rerank_preview_ingredients)
        .await
    {
        Ok(previews) => previews,
        Err(e) => {
            warn!(error = %e, "Failed to load ingredient previews for rerank");
            HashMap::new()
        }
    };

    let prompt = format_rerank_prompt(query, &hits, &previews, limit);
    let schema = StructuredSchema::of::<RerankResponse>(RERANK_SCHEMA_NAME);
    let response = bounded(
        "generate_structured",
        config.gateway_timeout,
        gateway.generate_structured(&prompt, prompts::RERANK_SYSTEM_PROMPT, &schema),
    )
    .await
    .map_err(|e| e.to_string())
    .and_then(|value| {
        serde_json::from_value::<RerankResponse>(value).map_err(|e| e.to_string())
    });

    match response {
        Ok(response) => {
            debug!(ranked = response.ranked.len(), "Rerank response");
            apply_rerank(hits, &response.ranked, limit, &config.search)
        }
        Err(error) => {
            warn!(error = %error, "Rerank failed; using similarity order");
            let mut hits = hits;
            hits.truncate(limit);
            hits
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn hit(title: &str, similarity: f32, age_secs: i64) -> SearchHit {
        SearchHit {
            id: RecipeId::new(),
            title: title.into(),
            similarity,
            rerank_score: None,
            combined_score: None,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    fn ranked(hit: &SearchHit, score: f32) -> RankedCandidate {
        RankedCandidate {
            id: hit.id.to_string(),
            score,
        }
    }

    #[test]
    fn test_combined_score_orders_results() {
        let a = hit("a", 0.90, 0);
        let b = hit("b", 0.60, 0);
        let ranking = vec![ranked(&a, 0.50), ranked(&b, 1.00)];

        let out = apply_rerank(vec![a.clone(), b.clone()], &ranking, 10, &SearchConfig::default());

        assert_eq!(out[0].id, b.id);
        let combined = out[0].combined_score.unwrap();
        assert!((combined - (0.7 * 1.0 + 0.3 * 0.60)).abs() < 1e-5);
        assert_eq!(out[1].id, a.id);
    }

    #[test]
    fn test_low_scores_are_dropped() {
        let a = hit("a", 0.90, 0);
        let b = hit("b", 0.80, 0);
        let ranking = vec![ranked(&a, 0.39), ranked(&b, 0.40)];

        let out = apply_rerank(vec![a, b.clone()], &ranking, 10, &SearchConfig::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, b.id);
    }

    #[test]
    fn test_unknown_ids_fall_back_to_similarity_order() {
        let a = hit("a", 0.90, 0);
        let b = hit("b", 0.80, 0);
        let ranking = vec![RankedCandidate {
            id: RecipeId::new().to_string(),
            score: 0.99,
        }];

        let out = apply_rerank(vec![a.clone(), b], &ranking, 1, &SearchConfig::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, a.id);
        assert!(out[0].rerank_score.is_none());
    }

    #[test]
    fn test_duplicate_ranked_ids_count_once() {
        let a = hit("a", 0.90, 0);
        let ranking = vec![ranked(&a, 0.9), ranked(&a, 0.1)];

        let out = apply_rerank(vec![a], &ranking, 10, &SearchConfig::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rerank_score, Some(0.9));
    }

    #[test]
    fn test_prompt_carries_previews() {
        let a = hit("Pesto", 0.9, 0);
        let mut previews = HashMap::new();
        previews.insert(a.id, vec!["basil".to_string()]);

        let prompt = format_rerank_prompt("green sauce", &[a.clone()], &previews, 5);
        let json: serde_json::Value = serde_json::from_str(&prompt).unwrap();

        assert_eq!(json["query"], "green sauce");
        assert_eq!(json["max_results"], 5);
        assert_eq!(json["candidates"][0]["id"], a.id.to_string());
        assert_eq!(json["candidates"][0]["ingredients_preview"][0], "basil");
    }
}
