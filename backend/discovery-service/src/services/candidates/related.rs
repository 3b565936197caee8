use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{CandidateSource, SourceQuery};
use crate::config::CandidateConfig;
use crate::error::Result;
use crate::models::{Candidate, CandidateKind};
use crate::services::cache::SearchCache;
use crate::stores::{MetricsSink, ProfileStore, RelationStore};

/// Candidate enriched with just enough profile data for post-retrieval
/// filtering. Cached as a unit so a burst of repeated calls for the same
/// user hits neither store.
#[derive(Clone)]
struct RelatedEntry {
    candidate: Candidate,
    display_name: String,
}

/// Retrieves subjects connected to the searcher through weighted relation
/// edges, ordered by edge weight descending.
pub struct RelatedCandidateSource {
    relations: Arc<dyn RelationStore>,
    profiles: Arc<dyn ProfileStore>,
    burst_cache: SearchCache<Vec<RelatedEntry>>,
    metrics: Arc<dyn MetricsSink>,
    config: CandidateConfig,
}

impl RelatedCandidateSource {
    pub fn new(
        relations: Arc<dyn RelationStore>,
        profiles: Arc<dyn ProfileStore>,
        metrics: Arc<dyn MetricsSink>,
        config: CandidateConfig,
    ) -> Self {
        let burst_cache = SearchCache::new(
            config.burst_cache_size,
            Duration::from_secs(config.burst_cache_ttl_secs),
        );
        Self {
            relations,
            profiles,
            burst_cache,
            metrics,
            config,
        }
    }

    /// Raw retrieval for a user, cached for the burst window
    async fn retrieve(&self, user_id: Uuid) -> Result<Vec<RelatedEntry>> {
        let key = format!("related:{}", user_id);

        if let Some(entries) = self.burst_cache.get(&key) {
            self.metrics.record_count("related_source_cache_hit", 1);
            return Ok(entries);
        }
        self.metrics.record_count("related_source_cache_miss", 1);

        let neighbors = self
            .relations
            .weighted_neighbors(
                user_id,
                self.config.min_edge_weight,
                self.config.related_fetch_limit,
            )
            .await?;

        let ids: Vec<Uuid> = neighbors
            .iter()
            .map(|n| n.subject_id)
            .filter(|id| *id != user_id)
            .collect();
        let profiles = self.profiles.get_profiles(&ids).await?;
        let by_id: HashMap<Uuid, _> = profiles.into_iter().map(|p| (p.user_id, p)).collect();

        let entries: Vec<RelatedEntry> = neighbors
            .into_iter()
            .filter(|n| n.subject_id != user_id)
            .filter_map(|n| match by_id.get(&n.subject_id) {
                Some(profile) => Some(RelatedEntry {
                    candidate: Candidate {
                        subject_id: n.subject_id,
                        weight: n.weight,
                        is_premium: profile.is_premium,
                        source: CandidateKind::Related,
                    },
                    display_name: profile.display_name.clone(),
                }),
                None => {
                    warn!(subject_id = %n.subject_id, "neighbor has no profile, skipping");
                    None
                }
            })
            .collect();

        self.burst_cache.set(&key, entries.clone(), None);
        Ok(entries)
    }
}

#[async_trait]
impl CandidateSource for RelatedCandidateSource {
    async fn find(
        &self,
        user_id: Uuid,
        query: &SourceQuery,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let entries = self.retrieve(user_id).await?;

        // Deduplicate by subject id, keeping the first occurrence
        let mut seen: HashSet<Uuid> = HashSet::with_capacity(entries.len());
        let mut deduped: Vec<RelatedEntry> = entries
            .into_iter()
            .filter(|e| seen.insert(e.candidate.subject_id))
            .collect();

        // Weight order before the premium cap: the store does not promise
        // any ordering, and the cap must keep the heaviest edges
        deduped.sort_by(|a, b| {
            b.candidate
                .weight
                .partial_cmp(&a.candidate.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let (mut premium, non_premium): (Vec<_>, Vec<_>) = deduped
            .into_iter()
            .partition(|e| e.candidate.is_premium);
        premium.truncate(self.config.max_premium);

        // Both halves are still weight-sorted; one stable re-sort restores
        // the combined order
        let mut merged: Vec<RelatedEntry> = premium;
        merged.extend(non_premium);
        merged.sort_by(|a, b| {
            b.candidate
                .weight
                .partial_cmp(&a.candidate.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Substring match against the term as typed (case-sensitive)
        let cap = limit.min(self.config.max_results);
        let candidates: Vec<Candidate> = merged
            .into_iter()
            .filter(|e| e.display_name.contains(&query.term))
            .take(cap)
            .map(|e| e.candidate)
            .collect();

        debug!(
            user_id = %user_id,
            count = candidates.len(),
            "related candidate retrieval completed"
        );
        Ok(candidates)
    }

    fn kind(&self) -> CandidateKind {
        CandidateKind::Related
    }
}
