//! LLM gateway trait.
//!
//! The pipeline treats text generation, structured extraction and embeddings as
//! an opaque upstream. Implementations wrap a concrete provider; the pipeline
//! applies its own timeouts and never retries.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::error::GatewayResult;

/// A named JSON schema describing the shape a structured call must return.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    pub name: String,
    pub schema: Value,
}

impl StructuredSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Schema derived from a `schemars` type.
    pub fn of<T: JsonSchema>(name: impl Into<String>) -> Self {
        Self::new(
            name,
            serde_json::to_value(schema_for!(T)).unwrap_or_default(),
        )
    }
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Free-form completion.
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> GatewayResult<String>;

    /// Completion constrained to `schema`; returns the parsed JSON, unvalidated.
    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: &str,
        schema: &StructuredSchema,
    ) -> GatewayResult<Value>;

    /// Embedding vector for `text`.
    async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>>;
}

#[async_trait]
impl<G: LlmGateway + ?Sized> LlmGateway for Arc<G> {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> GatewayResult<String> {
        (**self).generate_text(prompt, system_prompt).await
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: &str,
        schema: &StructuredSchema,
    ) -> GatewayResult<Value> {
        (**self)
            .generate_structured(prompt, system_prompt, schema)
            .await
    }

    async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>> {
        (**self).embed(text).await
    }
}
