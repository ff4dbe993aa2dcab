//! Response cache in front of an [`LlmGateway`].
//!
//! Entries are keyed by the SHA-256 of the operation and its inputs, expire
//! after a fixed TTL, and the oldest entry is evicted once capacity is reached.
//! Errors pass through and are never cached.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::GatewayResult;
use crate::traits::gateway::{LlmGateway, StructuredSchema};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
enum Cached {
    Text(String),
    Structured(Value),
    Embedding(Vec<f32>),
}

struct Entry {
    value: Cached,
    expires_at: Instant,
}

/// Gateway wrapper that memoizes successful responses.
pub struct CachedGateway<G> {
    inner: G,
    ttl: Duration,
    capacity: usize,
    entries: Mutex<IndexMap<String, Entry>>,
}

impl<G: LlmGateway> CachedGateway<G> {
    pub fn new(inner: G) -> Self {
        Self::with_limits(inner, DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }

    /// A zero `ttl` or `capacity` turns caching off.
    pub fn with_limits(inner: G, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            ttl,
            capacity,
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.capacity > 0
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, IndexMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, key: &str) -> Option<Cached> {
        if !self.is_enabled() {
            return None;
        }
        let mut entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.shift_remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: String, value: Cached) {
        if !self.is_enabled() {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.shift_remove(&key);
        while entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }
}

/// Hex SHA-256 over the operation name and each part, length-prefixed.
fn cache_key(operation: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[async_trait]
impl<G: LlmGateway> LlmGateway for CachedGateway<G> {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> GatewayResult<String> {
        let key = cache_key("generate_text", &[prompt, system_prompt]);
        if let Some(Cached::Text(text)) = self.get(&key) {
            debug!(operation = "generate_text", "Gateway cache hit");
            return Ok(text);
        }

        let text = self.inner.generate_text(prompt, system_prompt).await?;
        self.put(key, Cached::Text(text.clone()));
        Ok(text)
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: &str,
        schema: &StructuredSchema,
    ) -> GatewayResult<Value> {
        let schema_json = schema.schema.to_string();
        let key = cache_key(
            "generate_structured",
            &[prompt, system_prompt, &schema.name, &schema_json],
        );
        if let Some(Cached::Structured(value)) = self.get(&key) {
            debug!(operation = "generate_structured", schema = %schema.name, "Gateway cache hit");
            return Ok(value);
        }

        let value = self
            .inner
            .generate_structured(prompt, system_prompt, schema)
            .await?;
        self.put(key, Cached::Structured(value.clone()));
        Ok(value)
    }

    async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>> {
        let key = cache_key("embed", &[text]);
        if let Some(Cached::Embedding(vector)) = self.get(&key) {
            debug!(operation = "embed", "Gateway cache hit");
            return Ok(vector);
        }

        let vector = self.inner.embed(text).await?;
        self.put(key, Cached::Embedding(vector.clone()));
        Ok(vector)
    }
}
