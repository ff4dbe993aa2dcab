//! Cleanup stage: raw scraped text in, plain recipe text out.

use tracing::{debug, instrument};

use super::{bounded, prompts};
use crate::config::PipelineConfig;
use crate::error::{IngestError, Result, Stage};
use crate::traits::gateway::LlmGateway;

/// Strip markup and noise from `raw_text` via the gateway.
///
/// Fails with `InvalidInput` on blank input and `CleanupTooShort` when the
/// gateway returns fewer than `min_cleaned_chars` characters.
#[instrument(skip(gateway, raw_text, config), fields(raw_len = raw_text.len()))]
pub async fn clean<G: LlmGateway + ?Sized>(
    gateway: &G,
    raw_text: &str,
    config: &PipelineConfig,
) -> Result<String> {
    let raw_text = raw_text.trim();
    if raw_text.is_empty() {
        return Err(IngestError::invalid_input("raw text is empty"));
    }

    let prompt = prompts::format_cleanup_prompt(raw_text);
    let cleaned = bounded(
        "generate_text",
        config.gateway_timeout,
        gateway.generate_text(&prompt, prompts::CLEANUP_SYSTEM_PROMPT),
    )
    .await
    .map_err(|source| IngestError::UpstreamUnavailable {
        stage: Stage::Cleaning,
        source,
    })?;

    let cleaned = cleaned.trim();
    let length = cleaned.chars().count();
    if length < config.min_cleaned_chars {
        return Err(IngestError::CleanupTooShort {
            length,
            minimum: config.min_cleaned_chars,
        });
    }

    debug!(cleaned_len = length, "Input cleaned");
    Ok(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, GatewayError};
    use crate::testing::{MockGateway, MockGatewayCall, COOKIE_TEXT};

    #[tokio::test]
    async fn test_returns_trimmed_cleanup_output() {
        let gateway = MockGateway::new().with_text(format!("\n  {}  \n", COOKIE_TEXT));

        let cleaned = clean(&gateway, "<div>cookies</div>", &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(cleaned, COOKIE_TEXT);
        assert!(matches!(
            gateway.calls().as_slice(),
            [MockGatewayCall::GenerateText { .. }]
        ));
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_gateway() {
        let gateway = MockGateway::new();

        let err = clean(&gateway, "   \n\t ", &PipelineConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_short_output_is_rejected() {
        let gateway = MockGateway::new().with_text("No recipe here.");

        let err = clean(&gateway, "some page text", &PipelineConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::CleanupTooShort {
                length: 15,
                minimum: 50
            }
        ));
    }

    #[tokio::test]
    async fn test_gateway_failure_is_upstream_unavailable() {
        let gateway =
            MockGateway::new().fail_text_with(GatewayError::Unavailable("503".into()));

        let err = clean(&gateway, "some page text", &PipelineConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::UpstreamUnavailable {
                stage: Stage::Cleaning,
                ..
            }
        ));
    }
}
