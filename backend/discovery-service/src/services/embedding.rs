//! Interest embedding generation
//!
//! Derives a fixed-dimension L2-normalized vector from recent interaction
//! history. Features are projected into the vector with a deterministic
//! string hash and a sine-based pseudo-random spread; the hash formula
//! (`h = h<<5 - h + char`) is kept bit-compatible with embeddings already
//! stored by earlier deployments.
//!
//! The user and content variants share this implementation and differ
//! only in which interaction stream they pull.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::EmbeddingConfig;
use crate::error::{Result, SearchError};
use crate::models::{EmbeddingMetadata, EmbeddingSource, UserEmbedding};
use crate::stores::InteractionStore;

/// Normalize in place to unit magnitude; an all-zero vector is left
/// untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for v in vector.iter_mut() {
            *v /= magnitude;
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// 32-bit string hash: `h = h<<5 - h + char` with wrapping arithmetic
fn feature_hash(s: &str) -> i32 {
    let mut h: i32 = 0;
    for c in s.chars() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32);
    }
    h
}

fn position_for(hash: i32, spread: usize, dimension: usize) -> usize {
    ((hash.unsigned_abs() as u64).wrapping_mul(spread as u64 + 1) % dimension as u64) as usize
}

pub struct EmbeddingService {
    interactions: Arc<dyn InteractionStore>,
    config: EmbeddingConfig,
    source: EmbeddingSource,
    cache: DashMap<Uuid, UserEmbedding>,
}

impl EmbeddingService {
    pub fn user(interactions: Arc<dyn InteractionStore>, config: EmbeddingConfig) -> Self {
        Self::with_source(interactions, config, EmbeddingSource::User)
    }

    pub fn content(interactions: Arc<dyn InteractionStore>, config: EmbeddingConfig) -> Self {
        Self::with_source(interactions, config, EmbeddingSource::Content)
    }

    fn with_source(
        interactions: Arc<dyn InteractionStore>,
        config: EmbeddingConfig,
        source: EmbeddingSource,
    ) -> Self {
        Self {
            interactions,
            config,
            source,
            cache: DashMap::new(),
        }
    }

    /// Regenerate from scratch out of recent interaction history
    pub async fn generate(&self, owner_id: Uuid) -> Result<UserEmbedding> {
        let signals = self
            .interactions
            .recent_interactions(
                owner_id,
                self.source,
                self.config.max_signals,
                Duration::hours(self.config.window_hours),
            )
            .await?;

        let now = Utc::now();
        let mut feature_weights: HashMap<String, f64> = HashMap::new();
        for signal in &signals {
            let type_weight = self.config.interaction_weights.weight_for(signal.kind);
            let hours_ago =
                ((now - signal.occurred_at).num_minutes() as f64 / 60.0).max(0.0);
            let recency = 0.5_f64.powf(hours_ago / self.config.recency_half_life_hours);
            let weight = type_weight * recency;

            for tag in &signal.feature_tags {
                *feature_weights.entry(tag.clone()).or_insert(0.0) += weight;
            }
        }

        let dimension = self.config.dimension;
        let mut vector = vec![0.0_f32; dimension];
        for (tag, value) in &feature_weights {
            let hash = feature_hash(tag);
            for spread in 0..self.config.positions_per_feature {
                let idx = position_for(hash, spread, dimension);
                vector[idx] += (value * ((hash as f64) * (spread as f64 + 1.0)).sin()) as f32;
            }
        }
        l2_normalize(&mut vector);

        let embedding = UserEmbedding {
            owner_id,
            vector,
            dimension,
            updated_at: now,
            metadata: EmbeddingMetadata {
                signal_count: signals.len(),
                source: self.source,
            },
        };
        self.store(embedding.clone());

        debug!(
            owner_id = %owner_id,
            signal_count = embedding.metadata.signal_count,
            "embedding generated"
        );
        Ok(embedding)
    }

    /// Return the stored embedding, regenerating when missing or older
    /// than the freshness window
    pub async fn get(&self, owner_id: Uuid) -> Result<UserEmbedding> {
        if let Some(existing) = self.cache.get(&owner_id) {
            let age = Utc::now() - existing.updated_at;
            if age < Duration::hours(self.config.freshness_hours) {
                return Ok(existing.clone());
            }
        }
        self.generate(owner_id).await
    }

    /// Blend a new signal vector into the stored embedding using a fixed
    /// learning rate, then renormalize
    pub async fn update_incremental(
        &self,
        owner_id: Uuid,
        signal: &[f32],
    ) -> Result<UserEmbedding> {
        if signal.len() != self.config.dimension {
            return Err(SearchError::Validation(format!(
                "signal vector has dimension {}, expected {}",
                signal.len(),
                self.config.dimension
            )));
        }

        let current = self.get(owner_id).await?;
        let alpha = self.config.learning_rate;
        let mut blended: Vec<f32> = current
            .vector
            .iter()
            .zip(signal.iter())
            .map(|(old, new)| old * (1.0 - alpha) + new * alpha)
            .collect();
        l2_normalize(&mut blended);

        let embedding = UserEmbedding {
            owner_id,
            vector: blended,
            dimension: self.config.dimension,
            updated_at: Utc::now(),
            metadata: current.metadata,
        };
        self.store(embedding.clone());
        Ok(embedding)
    }

    /// Insert with a capacity bound: at capacity the entry with the
    /// oldest `updated_at` is evicted first
    fn store(&self, embedding: UserEmbedding) {
        if !self.cache.contains_key(&embedding.owner_id)
            && self.cache.len() >= self.config.cache_max_entries
        {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.value().updated_at)
                .map(|entry| *entry.key());
            if let Some(key) = oldest {
                self.cache.remove(&key);
            }
        }
        self.cache.insert(embedding.owner_id, embedding);
    }
}
