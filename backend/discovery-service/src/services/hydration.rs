//! Candidate hydration: batched, concurrency-bounded enrichment
//!
//! Turns raw candidates into fully-populated records without overwhelming
//! the profile store: fixed-size batches, processed in chunks of bounded
//! concurrency, with all per-subject lookups inside a batch issued
//! together. A failed batch aborts the whole call; partially-enriched
//! result sets are never returned.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use geo_utils::{distance_km, Coordinates};
use tracing::debug;
use uuid::Uuid;

use crate::config::HydrationConfig;
use crate::error::{Result, SearchError};
use crate::models::{Candidate, HydratedCandidate, Profile};
use crate::stores::{MetricsSink, ProfileStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationKind {
    Related,
    Unknown,
}

impl HydrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HydrationKind::Related => "related",
            HydrationKind::Unknown => "unknown",
        }
    }
}

pub struct HydrationService {
    profiles: Arc<dyn ProfileStore>,
    metrics: Arc<dyn MetricsSink>,
    config: HydrationConfig,
}

impl HydrationService {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        metrics: Arc<dyn MetricsSink>,
        config: HydrationConfig,
    ) -> Self {
        Self {
            profiles,
            metrics,
            config,
        }
    }

    /// Enrich candidates in input order.
    ///
    /// For `Unknown` candidates the requester's coordinates are resolved
    /// once per call and a per-candidate distance is computed; a requester
    /// without stored coordinates cannot receive proximity-based unknown
    /// results, so that call fails as a whole.
    pub async fn hydrate(
        &self,
        requester: Uuid,
        candidates: &[Candidate],
        kind: HydrationKind,
    ) -> Result<Vec<HydratedCandidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();

        let requester_coords = match kind {
            HydrationKind::Unknown => {
                Some(self.profiles.get_coordinates(requester).await?.ok_or_else(
                    || {
                        SearchError::Internal(format!(
                            "requester {} has no stored coordinates, cannot hydrate unknown candidates",
                            requester
                        ))
                    },
                )?)
            }
            HydrationKind::Related => None,
        };

        let batches: Vec<&[Candidate]> = candidates.chunks(self.config.batch_size).collect();
        self.metrics
            .record_count("hydration_batches", batches.len() as u64);

        let mut hydrated = Vec::with_capacity(candidates.len());
        for chunk in batches.chunks(self.config.max_concurrent_batches) {
            let results = try_join_all(
                chunk
                    .iter()
                    .map(|batch| self.hydrate_batch(requester, batch, requester_coords)),
            )
            .await?;
            for batch in results {
                hydrated.extend(batch);
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_duration("hydration", elapsed_ms);
        debug!(
            requester = %requester,
            kind = kind.as_str(),
            candidates = candidates.len(),
            batches = batches.len(),
            elapsed_ms,
            "hydration completed"
        );

        Ok(hydrated)
    }

    async fn hydrate_batch(
        &self,
        requester: Uuid,
        batch: &[Candidate],
        requester_coords: Option<Coordinates>,
    ) -> Result<Vec<HydratedCandidate>> {
        let ids: Vec<Uuid> = batch.iter().map(|c| c.subject_id).collect();
        let profiles = self.profiles.get_profiles(&ids).await?;
        let by_id: HashMap<Uuid, Profile> =
            profiles.into_iter().map(|p| (p.user_id, p)).collect();

        try_join_all(
            batch
                .iter()
                .map(|c| self.hydrate_one(requester, c, &by_id, requester_coords)),
        )
        .await
    }

    async fn hydrate_one(
        &self,
        requester: Uuid,
        candidate: &Candidate,
        profiles: &HashMap<Uuid, Profile>,
        requester_coords: Option<Coordinates>,
    ) -> Result<HydratedCandidate> {
        // The retrieval layer and the store must agree on existence
        let profile = profiles.get(&candidate.subject_id).ok_or_else(|| {
            SearchError::Internal(format!(
                "candidate {} returned by retrieval is missing from the profile store",
                candidate.subject_id
            ))
        })?;

        let (you_follow, follows_you, you_blocked, blocked_you) = tokio::try_join!(
            self.profiles.get_follow_status(requester, candidate.subject_id),
            self.profiles.get_follow_status(candidate.subject_id, requester),
            self.profiles.get_block_status(requester, candidate.subject_id),
            self.profiles.get_block_status(candidate.subject_id, requester),
        )?;

        let distance = match requester_coords {
            Some(origin) => self
                .profiles
                .get_coordinates(candidate.subject_id)
                .await?
                .map(|dest| distance_km(&origin, &dest)),
            None => None,
        };

        Ok(HydratedCandidate {
            subject_id: candidate.subject_id,
            weight: candidate.weight,
            is_premium: candidate.is_premium,
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            bio: profile.bio.clone(),
            is_verified: profile.is_verified,
            is_muted: profile.is_muted,
            is_active: profile.is_active,
            follower_count: profile.follower_count,
            content_count: profile.content_count,
            engagement_rate: profile.engagement_rate,
            reputation_score: profile.reputation_score,
            you_follow,
            follows_you,
            you_blocked,
            blocked_you,
            distance_km: distance,
            profile_picture_ref: profile.profile_picture_ref.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateKind;
    use crate::stores::InMemoryMetrics;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct FakeProfileStore {
        profiles: HashMap<Uuid, Profile>,
        coordinates: HashMap<Uuid, Coordinates>,
        follows: HashSet<(Uuid, Uuid)>,
        blocks: HashSet<(Uuid, Uuid)>,
    }

    #[async_trait]
    impl ProfileStore for FakeProfileStore {
        async fn get_profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
            Ok(ids
                .iter()
                .filter_map(|id| self.profiles.get(id).cloned())
                .collect())
        }

        async fn get_coordinates(&self, user_id: Uuid) -> Result<Option<Coordinates>> {
            Ok(self.coordinates.get(&user_id).copied())
        }

        async fn get_follow_status(&self, follower: Uuid, followee: Uuid) -> Result<bool> {
            Ok(self.follows.contains(&(follower, followee)))
        }

        async fn get_block_status(&self, blocker: Uuid, blocked: Uuid) -> Result<bool> {
            Ok(self.blocks.contains(&(blocker, blocked)))
        }
    }

    fn profile(id: Uuid) -> Profile {
        Profile {
            user_id: id,
            username: format!("user-{}", id.simple()),
            display_name: "User".into(),
            bio: String::new(),
            is_verified: false,
            is_muted: false,
            is_premium: false,
            is_active: true,
            follower_count: 10,
            content_count: 5,
            engagement_rate: 0.1,
            reputation_score: 0.5,
            profile_picture_ref: None,
        }
    }

    fn candidate(id: Uuid, source: CandidateKind) -> Candidate {
        Candidate {
            subject_id: id,
            weight: 0.5,
            is_premium: false,
            source,
        }
    }

    fn service(store: FakeProfileStore, config: HydrationConfig) -> (HydrationService, Arc<InMemoryMetrics>) {
        let metrics = Arc::new(InMemoryMetrics::new());
        (
            HydrationService::new(Arc::new(store), metrics.clone(), config),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_batching_25_candidates_into_3_batches() {
        let requester = Uuid::new_v4();
        let candidates: Vec<Candidate> = (0..25)
            .map(|_| candidate(Uuid::new_v4(), CandidateKind::Related))
            .collect();
        let profiles = candidates
            .iter()
            .map(|c| (c.subject_id, profile(c.subject_id)))
            .collect();

        let (service, metrics) = service(
            FakeProfileStore {
                profiles,
                coordinates: HashMap::new(),
                follows: HashSet::new(),
                blocks: HashSet::new(),
            },
            HydrationConfig {
                batch_size: 10,
                max_concurrent_batches: 3,
            },
        );

        let hydrated = service
            .hydrate(requester, &candidates, HydrationKind::Related)
            .await
            .unwrap();

        assert_eq!(hydrated.len(), 25);
        assert_eq!(metrics.count("hydration_batches"), 3);
        // output preserves input order
        for (c, h) in candidates.iter().zip(hydrated.iter()) {
            assert_eq!(c.subject_id, h.subject_id);
        }
    }

    #[tokio::test]
    async fn test_unknown_without_requester_coordinates_fails() {
        let requester = Uuid::new_v4();
        let subject = Uuid::new_v4();
        let (service, _) = service(
            FakeProfileStore {
                profiles: [(subject, profile(subject))].into_iter().collect(),
                coordinates: HashMap::new(),
                follows: HashSet::new(),
                blocks: HashSet::new(),
            },
            HydrationConfig::default(),
        );

        let result = service
            .hydrate(
                requester,
                &[candidate(subject, CandidateKind::Unknown)],
                HydrationKind::Unknown,
            )
            .await;

        assert!(matches!(result, Err(SearchError::Internal(_))));
    }

    #[tokio::test]
    async fn test_unknown_computes_distance_once_per_candidate() {
        let requester = Uuid::new_v4();
        let near = Uuid::new_v4();
        let unlocated = Uuid::new_v4();

        let (service, _) = service(
            FakeProfileStore {
                profiles: [near, unlocated]
                    .into_iter()
                    .map(|id| (id, profile(id)))
                    .collect(),
                coordinates: [
                    (requester, Coordinates::new(48.8566, 2.3522).unwrap()),
                    (near, Coordinates::new(48.86, 2.35).unwrap()),
                ]
                .into_iter()
                .collect(),
                follows: HashSet::new(),
                blocks: HashSet::new(),
            },
            HydrationConfig::default(),
        );

        let hydrated = service
            .hydrate(
                requester,
                &[
                    candidate(near, CandidateKind::Unknown),
                    candidate(unlocated, CandidateKind::Unknown),
                ],
                HydrationKind::Unknown,
            )
            .await
            .unwrap();

        assert!(hydrated[0].distance_km.unwrap() < 1.0);
        // candidate without coordinates keeps distance absent
        assert!(hydrated[1].distance_km.is_none());
    }

    #[tokio::test]
    async fn test_related_kind_skips_distance() {
        let requester = Uuid::new_v4();
        let subject = Uuid::new_v4();
        let (service, _) = service(
            FakeProfileStore {
                profiles: [(subject, profile(subject))].into_iter().collect(),
                coordinates: [
                    (requester, Coordinates::new(0.0, 0.0).unwrap()),
                    (subject, Coordinates::new(1.0, 1.0).unwrap()),
                ]
                .into_iter()
                .collect(),
                follows: HashSet::new(),
                blocks: HashSet::new(),
            },
            HydrationConfig::default(),
        );

        let hydrated = service
            .hydrate(
                requester,
                &[candidate(subject, CandidateKind::Related)],
                HydrationKind::Related,
            )
            .await
            .unwrap();

        assert!(hydrated[0].distance_km.is_none());
    }

    #[tokio::test]
    async fn test_unresolvable_subject_fails_whole_call() {
        let requester = Uuid::new_v4();
        let known = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        let (service, _) = service(
            FakeProfileStore {
                profiles: [(known, profile(known))].into_iter().collect(),
                coordinates: HashMap::new(),
                follows: HashSet::new(),
                blocks: HashSet::new(),
            },
            HydrationConfig::default(),
        );

        let result = service
            .hydrate(
                requester,
                &[
                    candidate(known, CandidateKind::Related),
                    candidate(ghost, CandidateKind::Related),
                ],
                HydrationKind::Related,
            )
            .await;

        assert!(matches!(result, Err(SearchError::Internal(_))));
    }

    #[tokio::test]
    async fn test_relationship_flags() {
        let requester = Uuid::new_v4();
        let subject = Uuid::new_v4();
        let (service, _) = service(
            FakeProfileStore {
                profiles: [(subject, profile(subject))].into_iter().collect(),
                coordinates: HashMap::new(),
                follows: [(requester, subject)].into_iter().collect(),
                blocks: [(subject, requester)].into_iter().collect(),
            },
            HydrationConfig::default(),
        );

        let hydrated = service
            .hydrate(
                requester,
                &[candidate(subject, CandidateKind::Related)],
                HydrationKind::Related,
            )
            .await
            .unwrap();

        assert!(hydrated[0].you_follow);
        assert!(!hydrated[0].follows_you);
        assert!(!hydrated[0].you_blocked);
        assert!(hydrated[0].blocked_you);
    }
}
