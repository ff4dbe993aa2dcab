use anyhow::{ensure, Context, Result};
use dotenvy::dotenv;
use recipe_ingestion::{DedupConfig, PipelineConfig, SearchConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LLM_MODEL: &str = "mistralai/mistral-small-3.2-24b-instruct";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Width of `recipe_embeddings.embedding` in the migrations.
pub const STORED_EMBEDDING_DIMENSION: usize = 768;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub dedupe_similarity_threshold: f32,
    pub dedupe_adjudication_threshold: Option<f32>,
    pub embedding_type: String,
    pub search_rerank_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_max_items: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub statement_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            dedupe_similarity_threshold: parse_or("DEDUPE_SIMILARITY_THRESHOLD", 0.95)?,
            dedupe_adjudication_threshold: parse_opt("DEDUPE_ADJUDICATION_THRESHOLD")?,
            embedding_type: env::var("DEDUPE_EMBEDDING_TYPE")
                .unwrap_or_else(|_| recipe_ingestion::config::DEFAULT_EMBEDDING_TYPE.to_string()),
            search_rerank_enabled: parse_or("SEARCH_RERANK_ENABLED", false)?,
            cache_ttl: Duration::from_secs(parse_or("LLM_CACHE_TTL_SECONDS", 3600)?),
            cache_max_items: parse_or("LLM_CACHE_MAX_ITEMS", 1024)?,
        })
    }

    /// Library-side view of the pipeline knobs.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut dedup =
            DedupConfig::default().with_similarity_threshold(self.dedupe_similarity_threshold);
        if let Some(threshold) = self.dedupe_adjudication_threshold {
            dedup = dedup.with_adjudication_threshold(threshold);
        }

        PipelineConfig::default()
            .with_embedding_dimension(self.llm.embedding_dimension)
            .with_embedding_type(self.embedding_type.clone())
            .with_gateway_timeout(self.llm.timeout)
            .with_dedup(dedup)
            .with_search(SearchConfig::default().with_rerank(self.search_rerank_enabled))
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            min_connections: parse_or("DATABASE_MIN_CONNECTIONS", 2)?,
            acquire_timeout: Duration::from_secs(parse_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 10)?),
            statement_timeout: Duration::from_millis(parse_or(
                "DATABASE_STATEMENT_TIMEOUT_MS",
                15_000,
            )?),
        })
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: env::var("OPENAI_API_KEY")
                .or_else(|_| env::var("OPEN_ROUTER_API_KEY"))
                .context("OPENAI_API_KEY must be set")?,
            base_url: env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.into()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.into()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.into()),
            embedding_dimension: check_embedding_dimension(parse_or(
                "EMBEDDING_DIMENSION",
                recipe_ingestion::config::DEFAULT_EMBEDDING_DIMENSION,
            )?)?,
            timeout: Duration::from_secs(parse_or("LLM_TIMEOUT_SECS", 60)?),
        })
    }
}

/// The vector column has a fixed width; any other dimension fails every insert.
pub fn check_embedding_dimension(dimension: usize) -> Result<usize> {
    ensure!(
        dimension == STORED_EMBEDDING_DIMENSION,
        "EMBEDDING_DIMENSION must be {STORED_EMBEDDING_DIMENSION} to match the recipe_embeddings column, got {dimension}"
    );
    Ok(dimension)
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(key)?.unwrap_or(default))
}

fn parse_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} must be a valid value, got '{raw}'")),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://localhost/forkfolio".into(),
                max_connections: 10,
                min_connections: 2,
                acquire_timeout: Duration::from_secs(10),
                statement_timeout: Duration::from_millis(15_000),
            },
            llm: LlmConfig {
                api_key: "test".into(),
                base_url: DEFAULT_LLM_BASE_URL.into(),
                model: DEFAULT_LLM_MODEL.into(),
                embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
                embedding_dimension: 768,
                timeout: Duration::from_secs(60),
            },
            dedupe_similarity_threshold: 0.9,
            dedupe_adjudication_threshold: Some(0.8),
            embedding_type: "title_ingredients".into(),
            search_rerank_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            cache_max_items: 1024,
        }
    }

    #[test]
    fn test_pipeline_config_carries_knobs() {
        let pipeline = sample().pipeline_config();

        assert_eq!(pipeline.dedup.similarity_threshold, 0.9);
        assert_eq!(pipeline.dedup.adjudication_band(), Some((0.8, 0.9)));
        assert_eq!(pipeline.embedding_dimension, 768);
        assert_eq!(pipeline.gateway_timeout, Duration::from_secs(60));
        assert!(pipeline.search.rerank_enabled);
    }

    #[test]
    fn test_embedding_dimension_must_match_column() {
        assert_eq!(check_embedding_dimension(768).unwrap(), 768);

        let err = check_embedding_dimension(1536).unwrap_err();
        assert!(err.to_string().contains("must be 768"));
        assert!(check_embedding_dimension(0).is_err());
    }

    #[test]
    fn test_default_dimension_matches_column() {
        assert_eq!(
            recipe_ingestion::config::DEFAULT_EMBEDDING_DIMENSION,
            STORED_EMBEDDING_DIMENSION
        );
    }

    #[test]
    fn test_parse_opt_rejects_garbage() {
        env::set_var("FORKFOLIO_TEST_PARSE_GARBAGE", "not-a-number");
        let parsed: Result<Option<u32>> = parse_opt("FORKFOLIO_TEST_PARSE_GARBAGE");
        assert!(parsed.is_err());

        let missing: Option<u32> = parse_opt("FORKFOLIO_TEST_PARSE_MISSING").unwrap();
        assert_eq!(missing, None);
    }
}
