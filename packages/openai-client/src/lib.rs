//! OpenAI-compatible REST client
//!
//! A minimal client for chat completions, JSON-schema structured outputs and embeddings.
//! Any OpenAI-compatible endpoint works (OpenAI itself, OpenRouter, local proxies) by
//! pointing [`OpenAIClient::with_base_url`] at it.
//!
//! # Example
//!
//! ```rust,ignore
//! use openai_client::{ChatRequest, OpenAIClient};
//!
//! let client = OpenAIClient::new(api_key)
//!     .with_base_url("https://openrouter.ai/api/v1");
//!
//! let reply = client
//!     .chat_completion(ChatRequest::with_prompts("gpt-4o-mini", "Be terse.", "Hi"))
//!     .await?;
//!
//! let vector = client
//!     .create_embedding_with_dimensions("2 cups flour", "text-embedding-3-small", Some(768))
//!     .await?;
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{OpenAIError, Result};
pub use schema::to_strict_schema;
pub use types::*;

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use types::{ChatResponseRaw, EmbeddingRequest, EmbeddingResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible API client.
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a whole-request timeout to every call made by this client.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OpenAIError::Config(e.to_string()))?;
        Ok(self)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Plain chat completion.
    ///
    /// An empty or null message content is returned as `""`; only a response
    /// without any choice is an error.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();
        let raw: ChatResponseRaw = self.post_json("chat/completions", &request).await?;

        let (content, usage) = raw
            .into_first_content()
            .ok_or_else(|| OpenAIError::Api("No choices in chat completion".into()))?;

        debug!(
            model = %request.model,
            content_len = content.len(),
            total_tokens = usage.as_ref().map(|u| u.total_tokens),
            duration_ms = start.elapsed().as_millis(),
            "Chat completion"
        );

        Ok(ChatResponse { content, usage })
    }

    /// Structured output; returns the raw JSON text produced by the model.
    pub async fn structured_output(&self, request: StructuredRequest) -> Result<String> {
        let start = Instant::now();
        let raw: ChatResponseRaw = self.post_json("chat/completions", &request).await?;

        let (content, _) = raw
            .into_first_content()
            .ok_or_else(|| OpenAIError::Api("No choices in structured output".into()))?;
        if content.trim().is_empty() {
            return Err(OpenAIError::Parse("Empty structured output".into()));
        }

        debug!(
            model = %request.model,
            schema = %request.response_format.json_schema.name,
            duration_ms = start.elapsed().as_millis(),
            "Structured output"
        );

        Ok(strip_code_blocks(&content).to_string())
    }

    /// Embedding with an explicit output dimension (text-embedding-3 models).
    pub async fn create_embedding_with_dimensions(
        &self,
        text: &str,
        model: &str,
        dimensions: Option<u32>,
    ) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model,
            input: text,
            dimensions,
        };
        let response: EmbeddingResponse = self.post_json("embeddings", &request).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| OpenAIError::Api("No embedding in response".into()))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, path, "Request failed");
                OpenAIError::from_reqwest(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, path, "API error");
            return Err(OpenAIError::Api(format!("{}: {}", status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| OpenAIError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_builder() {
        let client = OpenAIClient::new("sk-test").with_base_url("https://openrouter.ai/api/v1/");

        assert_eq!(client.api_key(), "sk-test");
        assert_eq!(client.base_url(), "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(OpenAIClient::new("k").base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_with_timeout_builds_client() {
        let client = OpenAIClient::new("k").with_timeout(Duration::from_secs(5));
        assert!(client.is_ok());
    }

    async fn serve_completion(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_empty_completion_is_ok_and_empty() {
        let server =
            serve_completion(serde_json::json!({"choices": [{"message": {"content": ""}}]})).await;
        let client = OpenAIClient::new("k").with_base_url(server.uri());

        let response = client
            .chat_completion(ChatRequest::with_prompts("m", "sys", "user"))
            .await
            .unwrap();

        assert_eq!(response.content, "");
    }

    #[tokio::test]
    async fn test_completion_without_choices_is_api_error() {
        let server = serve_completion(serde_json::json!({"choices": []})).await;
        let client = OpenAIClient::new("k").with_base_url(server.uri());

        let err = client
            .chat_completion(ChatRequest::with_prompts("m", "sys", "user"))
            .await
            .unwrap_err();

        assert!(matches!(err, OpenAIError::Api(_)));
    }

    #[tokio::test]
    async fn test_empty_structured_output_is_parse_error() {
        let server =
            serve_completion(serde_json::json!({"choices": [{"message": {"content": "  "}}]})).await;
        let client = OpenAIClient::new("k").with_base_url(server.uri());
        let request = StructuredRequest::new("m", "sys", "user", serde_json::json!({}));

        let err = client.structured_output(request).await.unwrap_err();

        assert!(matches!(err, OpenAIError::Parse(_)));
    }
}
