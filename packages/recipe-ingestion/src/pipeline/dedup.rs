//! Deduplication engine.
//!
//! A candidate is compared against stored embeddings of the same type. The
//! best match decides:
//!
//! - similarity >= `similarity_threshold`: duplicate
//! - inside the adjudication band, if configured: the gateway decides
//! - otherwise: distinct
//!
//! Adjudication failures never block an insert; they count as distinct.

use std::cmp::Ordering;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{bounded, prompts};
use crate::config::{DedupConfig, PipelineConfig};
use crate::error::Result;
use crate::traits::gateway::{LlmGateway, StructuredSchema};
use crate::traits::store::RecipeStore;
use crate::types::{
    ids::RecipeId,
    recipe::{Recipe, ValidatedRecipe},
    search::EmbeddingMatch,
};

pub const DEDUP_SCHEMA_NAME: &str = "dedupe_decision";

/// A stored recipe judged to be the same as the candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub recipe_id: RecipeId,
    pub similarity: f32,
    /// True when the gateway made the call inside the adjudication band
    pub adjudicated: bool,
}

/// What the similarity alone says about the best match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityVerdict {
    Duplicate,
    Adjudicate,
    Distinct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DedupChoice {
    Duplicate,
    Distinct,
}

/// Structured answer requested from the gateway in the adjudication band.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DedupDecision {
    pub decision: DedupChoice,
    pub reason: String,
}

pub fn classify_similarity(similarity: f32, config: &DedupConfig) -> SimilarityVerdict {
    if similarity >= config.similarity_threshold {
        return SimilarityVerdict::Duplicate;
    }
    match config.adjudication_band() {
        Some((low, _)) if similarity >= low => SimilarityVerdict::Adjudicate,
        _ => SimilarityVerdict::Distinct,
    }
}

/// Highest similarity wins; ties go to the lowest recipe id.
pub fn best_match(matches: &[EmbeddingMatch]) -> Option<&EmbeddingMatch> {
    matches.iter().min_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.recipe_id.cmp(&b.recipe_id))
    })
}

/// Look for a stored recipe that `candidate` duplicates.
#[instrument(skip_all, fields(title = %candidate.title))]
pub async fn find_duplicate<G, S>(
    gateway: &G,
    store: &S,
    candidate: &ValidatedRecipe,
    vector: &[f32],
    config: &PipelineConfig,
) -> Result<Option<DuplicateMatch>>
where
    G: LlmGateway + ?Sized,
    S: RecipeStore + ?Sized,
{
    let matches = store
        .nearest_embeddings(vector, &config.embedding_type, config.dedup.candidate_limit)
        .await?;

    let Some(best) = best_match(&matches) else {
        debug!("No stored embeddings to compare against");
        return Ok(None);
    };

    let duplicate = DuplicateMatch {
        recipe_id: best.recipe_id,
        similarity: best.similarity,
        adjudicated: false,
    };

    match classify_similarity(best.similarity, &config.dedup) {
        SimilarityVerdict::Duplicate => {
            info!(recipe_id = %best.recipe_id, similarity = best.similarity, "Duplicate found");
            Ok(Some(duplicate))
        }
        SimilarityVerdict::Distinct => {
            debug!(similarity = best.similarity, "Best match below threshold");
            Ok(None)
        }
        SimilarityVerdict::Adjudicate => {
            let Some(existing) = store.get_recipe(best.recipe_id).await? else {
                return Ok(None);
            };
            if adjudicate(gateway, candidate, &existing, config).await {
                info!(
                    recipe_id = %best.recipe_id,
                    similarity = best.similarity,
                    "Duplicate confirmed by adjudication"
                );
                Ok(Some(DuplicateMatch {
                    adjudicated: true,
                    ..duplicate
                }))
            } else {
                Ok(None)
            }
        }
    }
}

/// Ask the gateway whether two recipes are the same dish. Any failure means "no".
async fn adjudicate<G: LlmGateway + ?Sized>(
    gateway: &G,
    candidate: &ValidatedRecipe,
    existing: &Recipe,
    config: &PipelineConfig,
) -> bool {
    let existing = ValidatedRecipe {
        title: existing.title.clone(),
        ingredients: existing.ingredient_texts(),
        instructions: existing.instruction_texts(),
        servings: existing.servings.clone(),
        total_time: existing.total_time.clone(),
    };
    let prompt = prompts::format_dedup_prompt(candidate, &existing);
    let schema = StructuredSchema::of::<DedupDecision>(DEDUP_SCHEMA_NAME);

    let value = match bounded(
        "generate_structured",
        config.gateway_timeout,
        gateway.generate_structured(&prompt, prompts::DEDUP_SYSTEM_PROMPT, &schema),
    )
    .await
    {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Dedup adjudication failed; allowing insert");
            return false;
        }
    };

    match serde_json::from_value::<DedupDecision>(value) {
        Ok(decision) => {
            debug!(decision = ?decision.decision, reason = %decision.reason, "Adjudicated");
            decision.decision == DedupChoice::Duplicate
        }
        Err(e) => {
            warn!(error = %e, "Dedup adjudication returned bad JSON; allowing insert");
            false
        }
    }
}
