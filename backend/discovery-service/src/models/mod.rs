use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw retrieval output, not yet enriched. Ephemeral; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub subject_id: Uuid,
    pub weight: f32,
    pub is_premium: bool,
    pub source: CandidateKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateKind {
    Related,
    Unknown,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::Related => "related",
            CandidateKind::Unknown => "unknown",
        }
    }
}

/// Fully-enriched candidate record. Built once per request and immutable
/// afterwards; only the ranking step consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratedCandidate {
    pub subject_id: Uuid,
    pub weight: f32,
    pub is_premium: bool,
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub is_verified: bool,
    pub is_muted: bool,
    pub is_active: bool,
    pub follower_count: u32,
    pub content_count: u32,
    pub engagement_rate: f32,
    pub reputation_score: f32,
    pub you_follow: bool,
    pub follows_you: bool,
    pub you_blocked: bool,
    pub blocked_you: bool,
    pub distance_km: Option<f64>,
    pub profile_picture_ref: Option<String>,
}

impl HydratedCandidate {
    /// A block in either direction removes the pair from social scoring.
    pub fn is_blocked(&self) -> bool {
        self.you_blocked || self.blocked_you
    }
}

/// Per-factor score breakdown, each normalized to 0..1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub relevance: f32,
    pub social: f32,
    pub engagement: f32,
    pub proximity: f32,
    pub verification: f32,
    pub content: f32,
}

/// Scored, ordered search result. `rank` is a strict gapless ordering by
/// descending score with a stable tie-break on original retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingResult {
    pub subject: HydratedCandidate,
    pub score: f32,
    pub factors: FactorBreakdown,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    All,
    Related,
    Unknown,
    Verified,
    Nearby,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::All => "all",
            SearchType::Related => "related",
            SearchType::Unknown => "unknown",
            SearchType::Verified => "verified",
            SearchType::Nearby => "nearby",
        }
    }
}

impl Default for SearchType {
    fn default() -> Self {
        SearchType::All
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub verified_only: bool,
    #[serde(default)]
    pub min_followers: Option<u32>,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Score,
    Followers,
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sorting {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for Sorting {
    fn default() -> Self {
        Self {
            field: SortField::Score,
            direction: SortDirection::Desc,
        }
    }
}

/// Search request as received from the transport layer (already authenticated)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub term: String,
    pub searcher_user_id: Uuid,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub sorting: Sorting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub total: u32,
    pub limit: u32,
    pub offset: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub query_id: Uuid,
    pub duration_ms: u64,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub users: Vec<RankingResult>,
    pub pagination: PaginationInfo,
    pub search_metadata: SearchMetadata,
}

/// Profile as returned by the profile store collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub is_verified: bool,
    pub is_muted: bool,
    pub is_premium: bool,
    pub is_active: bool,
    pub follower_count: u32,
    pub content_count: u32,
    pub engagement_rate: f32,
    pub reputation_score: f32,
    pub profile_picture_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingSource {
    User,
    Content,
}

/// Fixed-dimension L2-normalized interest vector.
///
/// The vector has magnitude 1, or 0 when the owner had no interaction
/// signal at generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEmbedding {
    pub owner_id: Uuid,
    pub vector: Vec<f32>,
    pub dimension: usize,
    pub updated_at: DateTime<Utc>,
    pub metadata: EmbeddingMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub signal_count: usize,
    pub source: EmbeddingSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    Like,
    Pass,
    Message,
    ProfileView,
    ContentView,
    Share,
}

/// One interaction event pulled from history for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionSignal {
    pub owner_id: Uuid,
    pub kind: InteractionKind,
    pub feature_tags: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Precomputed content cluster, owned by the offline clustering pipeline.
/// The core only reads clusters to match against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCluster {
    pub id: Uuid,
    pub centroid: Vec<f32>,
    pub member_ids: BTreeSet<Uuid>,
    pub size: u32,
    pub density: f32,
    pub avg_engagement: f32,
    pub tags: Vec<String>,
}

/// Content-to-cluster join with per-pair scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub subject_id: Uuid,
    pub cluster_id: Uuid,
    pub similarity: f32,
    pub relevance_score: f32,
    pub engagement_score: f32,
    pub is_active: bool,
}

/// Cluster scored against a user profile
#[derive(Debug, Clone)]
pub struct ScoredCluster {
    pub cluster: ContentCluster,
    pub similarity: f32,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_type_deserializes_lowercase() {
        let ty: SearchType = serde_json::from_str("\"nearby\"").unwrap();
        assert_eq!(ty, SearchType::Nearby);
    }

    #[test]
    fn test_search_request_defaults() {
        let json = format!(
            r#"{{"term": "alice", "searcher_user_id": "{}"}}"#,
            Uuid::new_v4()
        );
        let request: SearchRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(request.search_type, SearchType::All);
        assert_eq!(request.pagination.limit, None);
        assert_eq!(request.sorting.field, SortField::Score);
    }

    #[test]
    fn test_is_blocked_either_direction() {
        let mut candidate = test_candidate();
        assert!(!candidate.is_blocked());

        candidate.you_blocked = true;
        assert!(candidate.is_blocked());

        candidate.you_blocked = false;
        candidate.blocked_you = true;
        assert!(candidate.is_blocked());
    }

    fn test_candidate() -> HydratedCandidate {
        HydratedCandidate {
            subject_id: Uuid::new_v4(),
            weight: 0.5,
            is_premium: false,
            username: "alice".into(),
            display_name: "Alice".into(),
            bio: String::new(),
            is_verified: false,
            is_muted: false,
            is_active: true,
            follower_count: 0,
            content_count: 0,
            engagement_rate: 0.0,
            reputation_score: 0.0,
            you_follow: false,
            follows_you: false,
            you_blocked: false,
            blocked_you: false,
            distance_km: None,
            profile_picture_ref: None,
        }
    }
}
