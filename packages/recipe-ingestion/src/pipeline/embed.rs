//! Embedding stage.

use tracing::{debug, instrument};

use super::bounded;
use crate::config::PipelineConfig;
use crate::error::{GatewayError, GatewayResult, IngestError, Result};
use crate::traits::gateway::LlmGateway;
use crate::types::recipe::ValidatedRecipe;

/// Deterministic text a recipe is embedded from.
pub fn embedding_text(title: &str, ingredients: &[String]) -> String {
    format!("Title: {}\nIngredients: {}", title, ingredients.join(", "))
}

/// Embed arbitrary text, checking the vector length against the configured dimension.
pub async fn embed_text<G: LlmGateway + ?Sized>(
    gateway: &G,
    text: &str,
    config: &PipelineConfig,
) -> GatewayResult<Vec<f32>> {
    let vector = bounded("embed", config.gateway_timeout, gateway.embed(text)).await?;

    if vector.len() != config.embedding_dimension {
        return Err(GatewayError::InvalidResponse(format!(
            "embedding has {} dimensions, expected {}",
            vector.len(),
            config.embedding_dimension
        )));
    }
    Ok(vector)
}

/// Embed a recipe's title and ingredients.
#[instrument(skip(gateway, recipe, config), fields(title = %recipe.title))]
pub async fn embed_recipe<G: LlmGateway + ?Sized>(
    gateway: &G,
    recipe: &ValidatedRecipe,
    config: &PipelineConfig,
) -> Result<Vec<f32>> {
    let text = embedding_text(&recipe.title, &recipe.ingredients);
    let vector = embed_text(gateway, &text, config)
        .await
        .map_err(|source| IngestError::EmbeddingUnavailable { source })?;

    debug!(dimension = vector.len(), "Recipe embedded");
    Ok(vector)
}
