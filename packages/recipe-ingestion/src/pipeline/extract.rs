//! Extraction stage: clean text in, validated structured recipe out.
//!
//! The gateway's JSON is validated here, before any downstream stage sees it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{bounded, prompts};
use crate::config::PipelineConfig;
use crate::error::{IngestError, Result, Stage};
use crate::traits::gateway::{LlmGateway, StructuredSchema};
use crate::types::recipe::ValidatedRecipe;

pub const EXTRACTION_SCHEMA_NAME: &str = "recipe_extraction";

/// Shape requested from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecipeExtraction {
    /// Recipe name
    pub title: String,
    /// Ingredient lines in source order
    pub ingredients: Vec<String>,
    /// Steps in source order, without numbering
    pub instructions: Vec<String>,
    pub servings: Option<String>,
    pub total_time: Option<String>,
}

/// Outcome of checking gateway output against the recipe shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Valid(ValidatedRecipe),
    SchemaError(String),
}

impl ExtractionOutcome {
    pub fn into_result(self) -> Result<ValidatedRecipe> {
        match self {
            ExtractionOutcome::Valid(recipe) => Ok(recipe),
            ExtractionOutcome::SchemaError(detail) => {
                Err(IngestError::ExtractionSchemaInvalid { detail })
            }
        }
    }
}

pub fn extraction_schema() -> StructuredSchema {
    StructuredSchema::of::<RecipeExtraction>(EXTRACTION_SCHEMA_NAME)
}

/// Validate raw gateway JSON into a recipe.
///
/// Entries are trimmed and blank entries dropped; order is otherwise kept.
/// A blank title or an empty ingredient or instruction list is a schema error.
pub fn validate_extraction(value: Value) -> ExtractionOutcome {
    let raw: RecipeExtraction = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => return ExtractionOutcome::SchemaError(e.to_string()),
    };

    let title = raw.title.trim().to_string();
    if title.is_empty() {
        return ExtractionOutcome::SchemaError("title is empty".into());
    }

    let ingredients = clean_lines(raw.ingredients);
    if ingredients.is_empty() {
        return ExtractionOutcome::SchemaError("no ingredients".into());
    }

    let instructions = clean_lines(raw.instructions);
    if instructions.is_empty() {
        return ExtractionOutcome::SchemaError("no instructions".into());
    }

    ExtractionOutcome::Valid(ValidatedRecipe {
        title,
        ingredients,
        instructions,
        servings: clean_optional(raw.servings),
        total_time: clean_optional(raw.total_time),
    })
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Ask the gateway for a structured recipe and validate it.
#[instrument(skip(gateway, clean_text, config), fields(text_len = clean_text.len()))]
pub async fn extract<G: LlmGateway + ?Sized>(
    gateway: &G,
    clean_text: &str,
    config: &PipelineConfig,
) -> Result<ValidatedRecipe> {
    let prompt = prompts::format_extraction_prompt(clean_text);
    let value = bounded(
        "generate_structured",
        config.gateway_timeout,
        gateway.generate_structured(&prompt, prompts::EXTRACTION_SYSTEM_PROMPT, &extraction_schema()),
    )
    .await
    .map_err(|source| IngestError::UpstreamUnavailable {
        stage: Stage::Extracting,
        source,
    })?;

    let outcome = validate_extraction(value);
    match &outcome {
        ExtractionOutcome::Valid(recipe) => debug!(
            title = %recipe.title,
            ingredients = recipe.ingredients.len(),
            instructions = recipe.instructions.len(),
            "Recipe extracted"
        ),
        ExtractionOutcome::SchemaError(detail) => {
            warn!(detail = %detail, "Extraction output failed validation")
        }
    }
    outcome.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{cookie_extraction, MockGateway, COOKIE_TEXT};
    use serde_json::json;

    #[test]
    fn test_valid_extraction_keeps_order() {
        let outcome = validate_extraction(json!({
            "title": " Chocolate Chip Cookies ",
            "ingredients": ["2 cups flour", "  ", "1 cup sugar"],
            "instructions": ["Mix", "Bake"],
            "servings": "",
            "total_time": "25 minutes"
        }));

        let ExtractionOutcome::Valid(recipe) = outcome else {
            panic!("expected valid extraction");
        };
        assert_eq!(recipe.title, "Chocolate Chip Cookies");
        assert_eq!(recipe.ingredients, vec!["2 cups flour", "1 cup sugar"]);
        assert_eq!(recipe.instructions, vec!["Mix", "Bake"]);
        assert_eq!(recipe.servings, None);
        assert_eq!(recipe.total_time.as_deref(), Some("25 minutes"));
    }

    #[test]
    fn test_missing_title_is_schema_error() {
        let outcome = validate_extraction(json!({
            "ingredients": ["flour"],
            "instructions": ["mix"]
        }));
        assert!(matches!(outcome, ExtractionOutcome::SchemaError(_)));
    }

    #[test]
    fn test_non_list_ingredients_is_schema_error() {
        let outcome = validate_extraction(json!({
            "title": "Bread",
            "ingredients": "flour, water",
            "instructions": ["knead"]
        }));
        assert!(matches!(outcome, ExtractionOutcome::SchemaError(_)));
    }

    #[test]
    fn test_blank_title_and_empty_lists_are_schema_errors() {
        for value in [
            json!({"title": "  ", "ingredients": ["a"], "instructions": ["b"]}),
            json!({"title": "T", "ingredients": [], "instructions": ["b"]}),
            json!({"title": "T", "ingredients": ["a"], "instructions": [" "]}),
        ] {
            assert!(matches!(
                validate_extraction(value),
                ExtractionOutcome::SchemaError(_)
            ));
        }
    }

    #[test]
    fn test_schema_lists_all_fields() {
        let schema = extraction_schema();
        assert_eq!(schema.name, EXTRACTION_SCHEMA_NAME);
        for field in ["title", "ingredients", "instructions", "servings", "total_time"] {
            assert!(schema.schema["properties"].get(field).is_some(), "{field}");
        }
    }

    #[tokio::test]
    async fn test_extract_maps_invalid_structure() {
        let gateway = MockGateway::new()
            .with_structured(EXTRACTION_SCHEMA_NAME, json!({"title": "", "ingredients": []}));

        let err = extract(&gateway, COOKIE_TEXT, &PipelineConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExtractionSchemaInvalid);
    }

    #[tokio::test]
    async fn test_extract_happy_path() {
        let gateway = MockGateway::new().with_structured(EXTRACTION_SCHEMA_NAME, cookie_extraction());

        let recipe = extract(&gateway, COOKIE_TEXT, &PipelineConfig::default())
            .await
            .unwrap();

        assert!(recipe.title.contains("Chocolate Chip Cookies"));
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.instructions.len(), 2);
    }
}
