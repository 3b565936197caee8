pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod stores;

pub use config::Config;
pub use error::{ErrorResponse, Result, SearchError};
pub use services::{
    ClusterMatcher, EmbeddingService, HydrationKind, HydrationService, RankingCriteria,
    RankingEngine, RecommendationEngine, RelatedCandidateSource, SearchCache, SearchOrchestrator,
    UnknownCandidateSource,
};
