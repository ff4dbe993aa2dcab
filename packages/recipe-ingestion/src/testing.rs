//! Testing utilities including mock implementations.
//!
//! Useful for exercising the pipeline without making real LLM calls.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::pipeline::{embed::embedding_text, extract::EXTRACTION_SCHEMA_NAME};
use crate::traits::gateway::{LlmGateway, StructuredSchema};
use crate::types::recipe::{NewRecipe, ValidatedRecipe};

/// The worked example recipe, already clean.
pub const COOKIE_TEXT: &str = "Chocolate Chip Cookies\n\nIngredients:\n- 2 cups flour\n- 1 cup sugar\n\nInstructions:\n1. Mix\n2. Bake";

/// Record of a call made to the mock gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum MockGatewayCall {
    GenerateText { prompt_len: usize },
    GenerateStructured { schema_name: String },
    Embed { text: String },
}

/// A mock gateway with scripted responses.
///
/// Defaults: text calls return [`COOKIE_TEXT`], `recipe_extraction` returns the
/// cookie recipe, other structured calls fail, and embeddings are derived
/// deterministically from the input text.
#[derive(Clone)]
pub struct MockGateway {
    text: Arc<RwLock<Option<String>>>,
    structured: Arc<RwLock<HashMap<String, Value>>>,
    embeddings: Arc<RwLock<HashMap<String, Vec<f32>>>>,
    embedding_dim: usize,

    text_error: Arc<RwLock<Option<GatewayError>>>,
    structured_error: Arc<RwLock<Option<GatewayError>>>,
    embed_error: Arc<RwLock<Option<GatewayError>>>,

    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<MockGatewayCall>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            text: Arc::default(),
            structured: Arc::default(),
            embeddings: Arc::default(),
            embedding_dim: crate::config::DEFAULT_EMBEDDING_DIMENSION,
            text_error: Arc::default(),
            structured_error: Arc::default(),
            embed_error: Arc::default(),
            delay: None,
            calls: Arc::default(),
        }
    }

    /// Response for every `generate_text` call.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        *self.text.write().unwrap() = Some(text.into());
        self
    }

    /// Response for `generate_structured` calls using the named schema.
    pub fn with_structured(self, schema_name: impl Into<String>, value: Value) -> Self {
        self.structured
            .write()
            .unwrap()
            .insert(schema_name.into(), value);
        self
    }

    /// Fixed embedding for an exact input text.
    pub fn with_embedding(self, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.embeddings
            .write()
            .unwrap()
            .insert(text.into(), embedding);
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    /// Sleep before answering any call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_text_with(self, error: GatewayError) -> Self {
        *self.text_error.write().unwrap() = Some(error);
        self
    }

    pub fn fail_structured_with(self, error: GatewayError) -> Self {
        *self.structured_error.write().unwrap() = Some(error);
        self
    }

    pub fn fail_embed_with(self, error: GatewayError) -> Self {
        *self.embed_error.write().unwrap() = Some(error);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockGatewayCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn record(&self, call: MockGatewayCall) {
        self.calls.write().unwrap().push(call);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LlmGateway for MockGateway {
    async fn generate_text(&self, prompt: &str, _system_prompt: &str) -> GatewayResult<String> {
        self.record(MockGatewayCall::GenerateText {
            prompt_len: prompt.len(),
        });
        self.pause().await;

        if let Some(err) = self.text_error.read().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .text
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| COOKIE_TEXT.to_string()))
    }

    async fn generate_structured(
        &self,
        _prompt: &str,
        _system_prompt: &str,
        schema: &StructuredSchema,
    ) -> GatewayResult<Value> {
        self.record(MockGatewayCall::GenerateStructured {
            schema_name: schema.name.clone(),
        });
        self.pause().await;

        if let Some(err) = self.structured_error.read().unwrap().clone() {
            return Err(err);
        }
        if let Some(value) = self.structured.read().unwrap().get(&schema.name) {
            return Ok(value.clone());
        }
        if schema.name == EXTRACTION_SCHEMA_NAME {
            return Ok(cookie_extraction());
        }
        Err(GatewayError::Unavailable(format!(
            "no scripted response for {}",
            schema.name
        )))
    }

    async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>> {
        self.record(MockGatewayCall::Embed {
            text: text.to_string(),
        });
        self.pause().await;

        if let Some(err) = self.embed_error.read().unwrap().clone() {
            return Err(err);
        }
        if let Some(embedding) = self.embeddings.read().unwrap().get(text) {
            return Ok(embedding.clone());
        }
        Ok(deterministic_embedding(text, self.embedding_dim))
    }
}

/// Generate a deterministic embedding based on text.
pub fn deterministic_embedding(text: &str, dim: usize) -> Vec<f32> {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(text.as_bytes());

    (0..dim)
        .map(|i| {
            // Re-mix the position in so long vectors don't just repeat every 32 values
            let byte = hash[i % 32].wrapping_add(((i / 32) as u8).wrapping_mul(31));
            (byte as f32 / 127.5) - 1.0
        })
        .collect()
}

/// Structured extraction output for [`COOKIE_TEXT`].
pub fn cookie_extraction() -> Value {
    json!({
        "title": "Chocolate Chip Cookies",
        "ingredients": ["2 cups flour", "1 cup sugar"],
        "instructions": ["Mix", "Bake"],
        "servings": null,
        "total_time": null
    })
}

pub fn cookie_recipe() -> ValidatedRecipe {
    ValidatedRecipe {
        title: "Chocolate Chip Cookies".into(),
        ingredients: vec!["2 cups flour".into(), "1 cup sugar".into()],
        instructions: vec!["Mix".into(), "Bake".into()],
        servings: None,
        total_time: None,
    }
}

/// A storable recipe whose embedding matches what [`MockGateway`] would produce.
pub fn new_recipe_from(recipe: ValidatedRecipe, config: &PipelineConfig) -> NewRecipe {
    let embedding = deterministic_embedding(
        &embedding_text(&recipe.title, &recipe.ingredients),
        config.embedding_dimension,
    );
    NewRecipe {
        recipe,
        source_url: None,
        is_test: true,
        embedding_type: config.embedding_type.clone(),
        embedding,
    }
}

pub fn cookie_new_recipe(config: &PipelineConfig) -> NewRecipe {
    new_recipe_from(cookie_recipe(), config)
}

/// A minimal storable recipe with the given title.
pub fn new_recipe_titled(title: &str, config: &PipelineConfig) -> NewRecipe {
    new_recipe_from(
        ValidatedRecipe {
            title: title.to_string(),
            ingredients: vec![format!("{} base", title), "salt".into()],
            instructions: vec!["Combine".into(), "Serve".into()],
            servings: Some("2".into()),
            total_time: None,
        },
        config,
    )
}
