// LlmGateway implementation over the OpenAI-compatible client
//
// Works against OpenAI or OpenRouter depending on the configured base URL.
// Prompts and schemas come from the pipeline; this layer only talks HTTP.

use std::time::Duration;

use async_trait::async_trait;
use openai_client::{to_strict_schema, ChatRequest, OpenAIClient, OpenAIError, StructuredRequest};
use recipe_ingestion::{GatewayError, GatewayResult, LlmGateway, StructuredSchema};
use serde_json::Value;

use crate::config::LlmConfig;

#[derive(Clone)]
pub struct OpenAiGateway {
    client: OpenAIClient,
    model: String,
    embedding_model: String,
    embedding_dimension: u32,
    timeout: Duration,
}

impl OpenAiGateway {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = OpenAIClient::new(config.api_key.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout(config.timeout)?;

        Ok(Self {
            client,
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_dimension: config.embedding_dimension as u32,
            timeout: config.timeout,
        })
    }

    fn map_error(&self, operation: &'static str, err: OpenAIError) -> GatewayError {
        match err {
            OpenAIError::Timeout(_) => GatewayError::Timeout {
                operation,
                after: self.timeout,
            },
            OpenAIError::Parse(detail) => GatewayError::InvalidResponse(detail),
            other => GatewayError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> GatewayResult<String> {
        let request = ChatRequest::with_prompts(&self.model, system_prompt, prompt).temperature(0.0);

        self.client
            .chat_completion(request)
            .await
            .map(|response| response.content)
            .map_err(|e| self.map_error("generate_text", e))
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: &str,
        schema: &StructuredSchema,
    ) -> GatewayResult<Value> {
        let request = StructuredRequest::new(
            &self.model,
            system_prompt,
            prompt,
            to_strict_schema(schema.schema.clone()),
        )
        .schema_name(&schema.name);

        let json = self
            .client
            .structured_output(request)
            .await
            .map_err(|e| self.map_error("generate_structured", e))?;

        serde_json::from_str(&json).map_err(|e| {
            GatewayError::InvalidResponse(format!("{} returned malformed JSON: {}", schema.name, e))
        })
    }

    async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>> {
        self.client
            .create_embedding_with_dimensions(
                text,
                &self.embedding_model,
                Some(self.embedding_dimension),
            )
            .await
            .map_err(|e| self.map_error("embed", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_ingestion::testing::COOKIE_TEXT;
    use recipe_ingestion::{ErrorKind, IngestRequest, MemoryStore, Pipeline, PipelineConfig, Stage};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_at(base_url: impl Into<String>) -> OpenAiGateway {
        OpenAiGateway::new(&LlmConfig {
            api_key: "test".into(),
            base_url: base_url.into(),
            model: "m".into(),
            embedding_model: "e".into(),
            embedding_dimension: 768,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn gateway() -> OpenAiGateway {
        gateway_at("http://localhost:9")
    }

    async fn serve_chat(content: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": content}}]})),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_empty_completion_is_empty_text() {
        let server = serve_chat(json!("")).await;

        let text = gateway_at(server.uri()).generate_text("p", "s").await.unwrap();

        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_page_without_recipe_fails_cleanup_as_invalid_input() {
        let server = serve_chat(Value::Null).await;
        let store = Arc::new(MemoryStore::new());
        let pipeline = Pipeline::new(
            Arc::new(gateway_at(server.uri())),
            store.clone(),
            PipelineConfig::default(),
        );

        let failure = pipeline
            .ingest(&IngestRequest::new(COOKIE_TEXT))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Cleaning);
        assert_eq!(failure.kind(), ErrorKind::InvalidInput);
        assert_eq!(store.row_counts().recipes, 0);
    }

    #[test]
    fn test_error_mapping() {
        let gateway = gateway();

        assert!(matches!(
            gateway.map_error("embed", OpenAIError::Timeout("slow".into())),
            GatewayError::Timeout { operation: "embed", .. }
        ));
        assert!(matches!(
            gateway.map_error("embed", OpenAIError::Parse("bad".into())),
            GatewayError::InvalidResponse(_)
        ));
        assert!(matches!(
            gateway.map_error("embed", OpenAIError::Api("500".into())),
            GatewayError::Unavailable(_)
        ));
    }
}
