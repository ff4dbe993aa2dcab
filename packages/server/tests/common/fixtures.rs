//! Test fixtures for creating test data.
//!
//! The database is shared between tests, so every fixture takes a unique title
//! to keep embeddings (and therefore dedup and search) from colliding.

use recipe_ingestion::testing::{new_recipe_from, MockGateway};
use recipe_ingestion::pipeline::extract::EXTRACTION_SCHEMA_NAME;
use recipe_ingestion::{NewRecipe, PipelineConfig, ValidatedRecipe};
use serde_json::json;
use uuid::Uuid;

/// A title no other test will produce.
pub fn unique_title(prefix: &str) -> String {
    format!("{} {}", prefix, Uuid::new_v4().simple())
}

pub fn recipe_titled(title: &str) -> ValidatedRecipe {
    ValidatedRecipe {
        title: title.to_string(),
        ingredients: vec![
            "2 cups flour".into(),
            "1 cup sugar".into(),
            format!("1 pinch of {title}"),
        ],
        instructions: vec!["Mix".into(), "Bake".into()],
        servings: Some("12".into()),
        total_time: Some("30 minutes".into()),
    }
}

pub fn new_recipe_titled(title: &str) -> NewRecipe {
    new_recipe_from(recipe_titled(title), &PipelineConfig::default())
}

/// Raw text long enough to pass the input checks.
pub fn raw_recipe_text(title: &str) -> String {
    format!(
        "{title}\n\nIngredients:\n- 2 cups flour\n- 1 cup sugar\n\nInstructions:\n1. Mix\n2. Bake\n\nShare this recipe with friends!"
    )
}

/// A gateway that cleans to a fixed text and extracts `title`.
pub fn gateway_for(title: &str) -> MockGateway {
    let recipe = recipe_titled(title);
    MockGateway::new()
        .with_text(raw_recipe_text(title))
        .with_structured(
            EXTRACTION_SCHEMA_NAME,
            json!({
                "title": recipe.title,
                "ingredients": recipe.ingredients,
                "instructions": recipe.instructions,
                "servings": recipe.servings,
                "total_time": recipe.total_time,
            }),
        )
}
