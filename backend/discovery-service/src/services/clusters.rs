//! Cluster matching and cold-start recommendations
//!
//! `ClusterMatcher` scores content clusters against a user embedding and
//! declared interests. `RecommendationEngine` turns the top clusters into
//! a hydrated, ranked candidate list for users with no search term at all.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::error::Result;
use crate::models::{
    Candidate, CandidateKind, ContentCluster, RankingResult, ScoredCluster, SearchType,
    UserEmbedding,
};
use crate::services::embedding::{cosine_similarity, EmbeddingService};
use crate::services::hydration::{HydrationKind, HydrationService};
use crate::services::ranking::{RankingCriteria, RankingEngine};
use crate::stores::{ClusterStore, MetricsSink};

/// Jaccard overlap between declared interests and cluster tags,
/// case-insensitive. Empty on either side scores 0.
fn interest_overlap(interests: &[String], tags: &[String]) -> f32 {
    if interests.is_empty() || tags.is_empty() {
        return 0.0;
    }
    let a: HashSet<String> = interests.iter().map(|s| s.to_lowercase()).collect();
    let b: HashSet<String> = tags.iter().map(|s| s.to_lowercase()).collect();
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

pub struct ClusterMatcher {
    config: MatchConfig,
}

impl ClusterMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Score clusters against the user and keep the best matches.
    ///
    /// The blended score combines embedding similarity, interest/tag
    /// overlap and a flat context contribution, in the configured ratios.
    /// Clusters below the match threshold are dropped; at most
    /// `max_clusters` survive, best first.
    pub fn match_clusters(
        &self,
        embedding: &UserEmbedding,
        interests: &[String],
        clusters: &[ContentCluster],
    ) -> Vec<ScoredCluster> {
        let mut scored: Vec<ScoredCluster> = clusters
            .iter()
            .map(|cluster| {
                let similarity = cosine_similarity(&embedding.vector, &cluster.centroid);
                let overlap = interest_overlap(interests, &cluster.tags);
                let score = similarity * self.config.similarity_ratio
                    + overlap * self.config.overlap_ratio
                    + self.config.context_weight * self.config.context_ratio;
                ScoredCluster {
                    cluster: cluster.clone(),
                    similarity,
                    score,
                }
            })
            .filter(|s| s.score >= self.config.min_match_threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.config.max_clusters);

        debug!(
            candidates = clusters.len(),
            matched = scored.len(),
            "cluster matching completed"
        );
        scored
    }
}

/// Interest-driven discovery with no search term
pub struct RecommendationEngine {
    clusters: Arc<dyn ClusterStore>,
    embeddings: Arc<EmbeddingService>,
    hydration: Arc<HydrationService>,
    ranking: Arc<RankingEngine>,
    matcher: ClusterMatcher,
    metrics: Arc<dyn MetricsSink>,
    config: MatchConfig,
}

impl RecommendationEngine {
    pub fn new(
        clusters: Arc<dyn ClusterStore>,
        embeddings: Arc<EmbeddingService>,
        hydration: Arc<HydrationService>,
        ranking: Arc<RankingEngine>,
        metrics: Arc<dyn MetricsSink>,
        config: MatchConfig,
    ) -> Self {
        let matcher = ClusterMatcher::new(config.clone());
        Self {
            clusters,
            embeddings,
            hydration,
            ranking,
            matcher,
            metrics,
            config,
        }
    }

    /// Recommend subjects from the user's best-matching clusters.
    ///
    /// Cluster members are collected best-cluster-first, carrying the
    /// cluster score as retrieval weight, then hydrated and ranked like
    /// any other candidate batch.
    pub async fn recommend(
        &self,
        user_id: Uuid,
        interests: &[String],
        limit: usize,
    ) -> Result<Vec<RankingResult>> {
        let embedding = self.embeddings.get(user_id).await?;
        let clusters = self.clusters.list_clusters().await?;
        let matched = self.matcher.match_clusters(&embedding, interests, &clusters);

        if matched.is_empty() {
            self.metrics.record_count("recommendation_no_match", 1);
            return Ok(Vec::new());
        }

        // Overfetch so post-ranking filters still leave a full page
        let fetch_cap = limit.saturating_mul(self.config.member_overfetch);
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut candidates: Vec<Candidate> = Vec::new();
        'outer: for scored in &matched {
            for member_id in &scored.cluster.member_ids {
                if *member_id == user_id || !seen.insert(*member_id) {
                    continue;
                }
                candidates.push(Candidate {
                    subject_id: *member_id,
                    weight: scored.score,
                    is_premium: false,
                    source: CandidateKind::Related,
                });
                if candidates.len() >= fetch_cap {
                    break 'outer;
                }
            }
        }

        let hydrated = self
            .hydration
            .hydrate(user_id, &candidates, HydrationKind::Related)
            .await?;

        let criteria = RankingCriteria {
            term: String::new(),
            search_type: SearchType::All,
        };
        let mut results = self.ranking.rank(hydrated, &criteria);
        results.truncate(limit);

        self.metrics
            .record_count("recommendation_results", results.len() as u64);
        info!(
            user_id = %user_id,
            matched_clusters = matched.len(),
            results = results.len(),
            "recommendations generated"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, HydrationConfig, RankingConfig};
    use crate::models::{
        ClusterAssignment, EmbeddingMetadata, EmbeddingSource, InteractionKind, InteractionSignal,
        Profile,
    };
    use crate::stores::{InMemoryMetrics, InteractionStore, ProfileStore};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use geo_utils::Coordinates;
    use std::collections::BTreeSet;

    fn embedding(vector: Vec<f32>) -> UserEmbedding {
        let dimension = vector.len();
        UserEmbedding {
            owner_id: Uuid::new_v4(),
            vector,
            dimension,
            updated_at: Utc::now(),
            metadata: EmbeddingMetadata {
                signal_count: 1,
                source: EmbeddingSource::User,
            },
        }
    }

    fn cluster(centroid: Vec<f32>, tags: &[&str], members: &[Uuid]) -> ContentCluster {
        ContentCluster {
            id: Uuid::new_v4(),
            centroid,
            member_ids: members.iter().copied().collect::<BTreeSet<_>>(),
            size: members.len() as u32,
            density: 0.5,
            avg_engagement: 0.1,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_overlap_is_case_insensitive_jaccard() {
        let interests = vec!["Music".to_string(), "travel".to_string()];
        let tags = vec!["music".to_string(), "food".to_string()];
        // intersection 1, union 3
        assert!((interest_overlap(&interests, &tags) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(interest_overlap(&[], &tags), 0.0);
    }

    #[test]
    fn test_match_clusters_sorted_and_capped() {
        let config = MatchConfig {
            max_clusters: 2,
            ..Default::default()
        };
        let matcher = ClusterMatcher::new(config);
        let user = embedding(vec![1.0, 0.0]);

        let clusters = vec![
            cluster(vec![0.0, 1.0], &[], &[]),  // orthogonal
            cluster(vec![1.0, 0.0], &[], &[]),  // aligned
            cluster(vec![0.7, 0.7], &[], &[]),  // diagonal
        ];
        let matched = matcher.match_clusters(&user, &[], &clusters);

        assert_eq!(matched.len(), 2);
        assert!(matched[0].score >= matched[1].score);
        assert!((matched[0].similarity - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_match_threshold_drops_weak_clusters() {
        let config = MatchConfig {
            min_match_threshold: 0.9,
            ..Default::default()
        };
        let matcher = ClusterMatcher::new(config);
        let user = embedding(vec![1.0, 0.0]);

        let clusters = vec![cluster(vec![0.0, 1.0], &[], &[])];
        assert!(matcher.match_clusters(&user, &[], &clusters).is_empty());
    }

    struct FakeClusterStore {
        clusters: Vec<ContentCluster>,
    }

    #[async_trait]
    impl ClusterStore for FakeClusterStore {
        async fn list_clusters(&self) -> Result<Vec<ContentCluster>> {
            Ok(self.clusters.clone())
        }

        async fn assignments_for(&self, _content_id: Uuid) -> Result<Vec<ClusterAssignment>> {
            Ok(Vec::new())
        }
    }

    struct FakeInteractionStore;

    #[async_trait]
    impl InteractionStore for FakeInteractionStore {
        async fn recent_interactions(
            &self,
            _owner_id: Uuid,
            _source: EmbeddingSource,
            _max_count: usize,
            _window: Duration,
        ) -> Result<Vec<InteractionSignal>> {
            Ok(vec![InteractionSignal {
                owner_id: Uuid::new_v4(),
                kind: InteractionKind::Like,
                feature_tags: vec!["music".to_string()],
                occurred_at: Utc::now(),
            }])
        }
    }

    struct FakeProfileStore;

    #[async_trait]
    impl ProfileStore for FakeProfileStore {
        async fn get_profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
            Ok(ids
                .iter()
                .map(|id| Profile {
                    user_id: *id,
                    username: format!("user_{}", id.simple()),
                    display_name: "Member".to_string(),
                    bio: String::new(),
                    is_verified: false,
                    is_muted: false,
                    is_premium: false,
                    is_active: true,
                    follower_count: 500,
                    content_count: 50,
                    engagement_rate: 0.1,
                    reputation_score: 0.5,
                    profile_picture_ref: None,
                })
                .collect())
        }

        async fn get_coordinates(&self, _user_id: Uuid) -> Result<Option<Coordinates>> {
            Ok(None)
        }

        async fn get_follow_status(&self, _a: Uuid, _b: Uuid) -> Result<bool> {
            Ok(false)
        }

        async fn get_block_status(&self, _a: Uuid, _b: Uuid) -> Result<bool> {
            Ok(false)
        }
    }

    fn engine(clusters: Vec<ContentCluster>) -> RecommendationEngine {
        let metrics: Arc<InMemoryMetrics> = Arc::new(InMemoryMetrics::new());
        RecommendationEngine::new(
            Arc::new(FakeClusterStore { clusters }),
            Arc::new(EmbeddingService::user(
                Arc::new(FakeInteractionStore),
                EmbeddingConfig {
                    dimension: 2,
                    ..Default::default()
                },
            )),
            Arc::new(HydrationService::new(
                Arc::new(FakeProfileStore),
                metrics.clone(),
                HydrationConfig::default(),
            )),
            Arc::new(RankingEngine::new(RankingConfig {
                min_score: 0.0,
                ..Default::default()
            })),
            metrics,
            MatchConfig {
                min_match_threshold: 0.0,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_recommend_excludes_requester_and_respects_limit() {
        let requester = Uuid::new_v4();
        let members: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let mut all = members.clone();
        all.push(requester);

        let engine = engine(vec![cluster(vec![1.0, 0.0], &["music"], &all)]);
        let results = engine.recommend(requester, &[], 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.subject.subject_id != requester));
    }

    #[tokio::test]
    async fn test_recommend_empty_without_matching_clusters() {
        let engine = engine(Vec::new());
        let results = engine.recommend(Uuid::new_v4(), &[], 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_recommend_dedups_members_across_clusters() {
        let shared = Uuid::new_v4();
        let engine = engine(vec![
            cluster(vec![1.0, 0.0], &["music"], &[shared]),
            cluster(vec![0.9, 0.1], &["travel"], &[shared, Uuid::new_v4()]),
        ]);
        let results = engine.recommend(Uuid::new_v4(), &[], 10).await.unwrap();

        let ids: Vec<Uuid> = results.iter().map(|r| r.subject.subject_id).collect();
        let unique: HashSet<Uuid> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
    }
}
