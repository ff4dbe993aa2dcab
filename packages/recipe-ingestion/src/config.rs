//! Pipeline tuning knobs.
//!
//! Everything here is plain data with a `Default`; the application crate fills
//! these from the environment.

use std::time::Duration;

/// Minimum characters of trimmed raw input before the pipeline starts.
pub const MIN_RAW_INPUT_CHARS: usize = 10;

/// Minimum characters of cleanup output; anything shorter means no recipe was found.
pub const MIN_CLEANED_CHARS: usize = 50;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

pub const DEFAULT_EMBEDDING_TYPE: &str = "title_ingredients";

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.95;

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub min_raw_input_chars: usize,
    pub min_cleaned_chars: usize,

    /// Expected vector length; gateway output of any other size is rejected
    pub embedding_dimension: usize,

    /// Tag written with every stored embedding and compared by dedup/search
    pub embedding_type: String,

    /// Applied to each gateway call separately
    pub gateway_timeout: Duration,

    pub dedup: DedupConfig,
    pub search: SearchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_raw_input_chars: MIN_RAW_INPUT_CHARS,
            min_cleaned_chars: MIN_CLEANED_CHARS,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            embedding_type: DEFAULT_EMBEDDING_TYPE.to_string(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            dedup: DedupConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    pub fn with_embedding_type(mut self, embedding_type: impl Into<String>) -> Self {
        self.embedding_type = embedding_type.into();
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }
}

/// Deduplication decision thresholds.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Best match at or above this is a duplicate, no questions asked
    pub similarity_threshold: f32,

    /// Lower edge of the band where the gateway adjudicates; `None` disables the band
    pub adjudication_threshold: Option<f32>,

    /// How many nearest neighbours to pull from the store
    pub candidate_limit: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            adjudication_threshold: None,
            candidate_limit: 5,
        }
    }
}

impl DedupConfig {
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_adjudication_threshold(mut self, threshold: f32) -> Self {
        self.adjudication_threshold = Some(threshold);
        self
    }

    /// The adjudication band, if configured and non-empty.
    pub fn adjudication_band(&self) -> Option<(f32, f32)> {
        self.adjudication_threshold
            .filter(|low| *low < self.similarity_threshold)
            .map(|low| (low, self.similarity_threshold))
    }
}

/// Semantic search limits and reranking.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub min_query_chars: usize,

    pub rerank_enabled: bool,
    /// Candidates fetched per requested result when reranking
    pub rerank_candidate_multiplier: usize,
    pub rerank_min_score: f32,
    /// Weight of the rerank score in the combined score; similarity gets the rest
    pub rerank_weight: f32,
    pub rerank_preview_ingredients: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 50,
            min_query_chars: 2,
            rerank_enabled: false,
            rerank_candidate_multiplier: 3,
            rerank_min_score: 0.40,
            rerank_weight: 0.70,
            rerank_preview_ingredients: 8,
        }
    }
}

impl SearchConfig {
    pub fn with_rerank(mut self, enabled: bool) -> Self {
        self.rerank_enabled = enabled;
        self
    }

    /// Clamp a caller-supplied limit into `[1, max_limit]`, defaulting when absent.
    pub fn clamp_limit(&self, limit: Option<i64>) -> usize {
        match limit {
            None => self.default_limit,
            Some(n) if n < 1 => 1,
            Some(n) => (n as usize).min(self.max_limit),
        }
    }
}
