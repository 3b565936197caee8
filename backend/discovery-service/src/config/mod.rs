use std::env;

use serde::Deserialize;

use crate::error::{Result, SearchError};
use crate::models::InteractionKind;

const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub candidates: CandidateConfig,
    pub hydration: HydrationConfig,
    pub cache: CacheSettings,
    pub ranking: RankingConfig,
    pub embedding: EmbeddingConfig,
    pub matching: MatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub default_limit: u32,
    pub max_limit: u32,
    pub max_term_len: usize,
    pub min_suggestion_len: usize,
    pub result_ttl_secs: u64,
    pub suggestion_ttl_secs: u64,
    pub timeout_ms: u64,
    pub max_candidates: usize,
    pub rate_limit_per_minute: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            max_term_len: 100,
            min_suggestion_len: 2,
            result_ttl_secs: 300,
            suggestion_ttl_secs: 120,
            timeout_ms: 2000,
            max_candidates: 500,
            rate_limit_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateConfig {
    /// How many weighted neighbors to pull before filtering
    pub related_fetch_limit: usize,
    /// Minimum edge weight for a relation to count
    pub min_edge_weight: f32,
    /// Cap on premium candidates in the filtered related set
    pub max_premium: usize,
    /// Global cap on candidates emitted by one source
    pub max_results: usize,
    /// Burst-absorbing cache window for related retrieval
    pub burst_cache_ttl_secs: u64,
    pub burst_cache_size: usize,
    pub unknown_sample_limit: usize,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            related_fetch_limit: 200,
            min_edge_weight: 0.0,
            max_premium: 10,
            max_results: 100,
            burst_cache_ttl_secs: 10,
            burst_cache_size: 1024,
            unknown_sample_limit: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HydrationConfig {
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 15,
            max_concurrent_batches: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub max_size: usize,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: 1000,
            sweep_interval_secs: 60,
        }
    }
}

/// Named ranking-factor weights. Must sum to 1.0; `validate` catches
/// misconfiguration at startup instead of silently skewing scores.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingWeights {
    pub relevance: f32,
    pub social: f32,
    pub engagement: f32,
    pub proximity: f32,
    pub verification: f32,
    pub content: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: 0.30,
            social: 0.20,
            engagement: 0.15,
            proximity: 0.15,
            verification: 0.10,
            content: 0.10,
        }
    }
}

impl RankingWeights {
    pub fn sum(&self) -> f32 {
        self.relevance
            + self.social
            + self.engagement
            + self.proximity
            + self.verification
            + self.content
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    /// Distance normalization radius for the proximity factor
    pub max_radius_km: f64,
    /// Results below this score are dropped after ranking
    pub min_score: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            max_radius_km: 100.0,
            min_score: 5.0,
        }
    }
}

/// Per-interaction-type signal weights for embedding generation
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionWeights {
    pub like: f64,
    pub pass: f64,
    pub message: f64,
    pub profile_view: f64,
    pub content_view: f64,
    pub share: f64,
}

impl Default for InteractionWeights {
    fn default() -> Self {
        Self {
            like: 1.0,
            pass: -0.5,
            message: 2.5,
            profile_view: 0.5,
            content_view: 0.8,
            share: 3.0,
        }
    }
}

impl InteractionWeights {
    pub fn weight_for(&self, kind: InteractionKind) -> f64 {
        match kind {
            InteractionKind::Like => self.like,
            InteractionKind::Pass => self.pass,
            InteractionKind::Message => self.message,
            InteractionKind::ProfileView => self.profile_view,
            InteractionKind::ContentView => self.content_view,
            InteractionKind::Share => self.share,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub dimension: usize,
    /// Bounded interaction history pull
    pub max_signals: usize,
    pub window_hours: i64,
    /// EMA blend factor for incremental updates
    pub learning_rate: f32,
    /// Embeddings older than this are regenerated on read
    pub freshness_hours: i64,
    pub recency_half_life_hours: f64,
    /// Vector positions touched per hashed feature
    pub positions_per_feature: usize,
    /// Cap on cached embeddings; oldest entry is evicted at capacity
    pub cache_max_entries: usize,
    pub interaction_weights: InteractionWeights,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 128,
            max_signals: 200,
            window_hours: 720,
            learning_rate: 0.2,
            freshness_hours: 24,
            recency_half_life_hours: 72.0,
            positions_per_feature: 3,
            cache_max_entries: 10_000,
            interaction_weights: InteractionWeights::default(),
        }
    }
}

/// Cluster matching knobs. The three ratios blend similarity,
/// interest overlap and context weight and must sum to 1.0.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchConfig {
    pub min_match_threshold: f32,
    pub max_clusters: usize,
    pub similarity_ratio: f32,
    pub overlap_ratio: f32,
    pub context_ratio: f32,
    pub context_weight: f32,
    /// Overfetch multiplier when expanding cluster members into candidates
    pub member_overfetch: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_match_threshold: 0.1,
            max_clusters: 5,
            similarity_ratio: 0.6,
            overlap_ratio: 0.25,
            context_ratio: 0.15,
            context_weight: 0.5,
            member_overfetch: 3,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: &str) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{} must be a valid {}", key, std::any::type_name::<T>()))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            search: SearchConfig {
                default_limit: env_parse("SEARCH_DEFAULT_LIMIT", "20"),
                max_limit: env_parse("SEARCH_MAX_LIMIT", "100"),
                result_ttl_secs: env_parse("SEARCH_RESULT_TTL_SECS", "300"),
                suggestion_ttl_secs: env_parse("SEARCH_SUGGESTION_TTL_SECS", "120"),
                timeout_ms: env_parse("SEARCH_TIMEOUT_MS", "2000"),
                max_candidates: env_parse("SEARCH_MAX_CANDIDATES", "500"),
                rate_limit_per_minute: env_parse("SEARCH_RATE_LIMIT_PER_MINUTE", "60"),
                ..SearchConfig::default()
            },
            candidates: CandidateConfig {
                related_fetch_limit: env_parse("RELATED_FETCH_LIMIT", "200"),
                max_premium: env_parse("RELATED_MAX_PREMIUM", "10"),
                unknown_sample_limit: env_parse("UNKNOWN_SAMPLE_LIMIT", "200"),
                ..CandidateConfig::default()
            },
            hydration: HydrationConfig {
                batch_size: env_parse("HYDRATION_BATCH_SIZE", "15"),
                max_concurrent_batches: env_parse("HYDRATION_MAX_CONCURRENT_BATCHES", "3"),
            },
            cache: CacheSettings {
                max_size: env_parse("SEARCH_CACHE_MAX_SIZE", "1000"),
                sweep_interval_secs: env_parse("SEARCH_CACHE_SWEEP_INTERVAL_SECS", "60"),
            },
            ranking: RankingConfig {
                max_radius_km: env_parse("RANKING_MAX_RADIUS_KM", "100"),
                min_score: env_parse("RANKING_MIN_SCORE", "5"),
                ..RankingConfig::default()
            },
            embedding: EmbeddingConfig {
                dimension: env_parse("EMBEDDING_DIMENSION", "128"),
                learning_rate: env_parse("EMBEDDING_LEARNING_RATE", "0.2"),
                freshness_hours: env_parse("EMBEDDING_FRESHNESS_HOURS", "24"),
                cache_max_entries: env_parse("EMBEDDING_CACHE_MAX_ENTRIES", "10000"),
                ..EmbeddingConfig::default()
            },
            matching: MatchConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on weight-table and limit misconfiguration
    pub fn validate(&self) -> Result<()> {
        let weights = &self.ranking.weights;
        for (name, value) in [
            ("relevance", weights.relevance),
            ("social", weights.social),
            ("engagement", weights.engagement),
            ("proximity", weights.proximity),
            ("verification", weights.verification),
            ("content", weights.content),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SearchError::Validation(format!(
                    "ranking weight {} out of range: {}",
                    name, value
                )));
            }
        }
        if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SearchError::Validation(format!(
                "ranking weights must sum to 1.0, got {}",
                weights.sum()
            )));
        }

        let ratio_sum = self.matching.similarity_ratio
            + self.matching.overlap_ratio
            + self.matching.context_ratio;
        if (ratio_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SearchError::Validation(format!(
                "cluster match ratios must sum to 1.0, got {}",
                ratio_sum
            )));
        }

        if self.embedding.dimension == 0 {
            return Err(SearchError::Validation(
                "embedding dimension must be positive".into(),
            ));
        }
        if self.embedding.positions_per_feature == 0 {
            return Err(SearchError::Validation(
                "positions_per_feature must be positive".into(),
            ));
        }
        if self.embedding.cache_max_entries == 0 {
            return Err(SearchError::Validation(
                "embedding cache capacity must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.embedding.learning_rate)
            || self.embedding.learning_rate == 0.0
        {
            return Err(SearchError::Validation(format!(
                "embedding learning rate must be in (0, 1], got {}",
                self.embedding.learning_rate
            )));
        }

        if self.hydration.batch_size == 0 || self.hydration.max_concurrent_batches == 0 {
            return Err(SearchError::Validation(
                "hydration batch size and concurrency must be positive".into(),
            ));
        }

        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(SearchError::Validation(format!(
                "default limit {} must be in 1..={}",
                self.search.default_limit, self.search.max_limit
            )));
        }

        if self.ranking.max_radius_km <= 0.0 {
            return Err(SearchError::Validation(
                "ranking max radius must be positive".into(),
            ));
        }

        Ok(())
    }
}
