pub mod cache;
pub mod candidates;
pub mod clusters;
pub mod embedding;
pub mod hydration;
pub mod orchestrator;
pub mod ranking;

pub use cache::{CacheStats, SearchCache};
pub use candidates::{
    CandidateSource, RelatedCandidateSource, SourceQuery, UnknownCandidateSource,
};
pub use clusters::{ClusterMatcher, RecommendationEngine};
pub use embedding::{cosine_similarity, l2_normalize, EmbeddingService};
pub use hydration::{HydrationKind, HydrationService};
pub use orchestrator::SearchOrchestrator;
pub use ranking::{RankingCriteria, RankingEngine};
