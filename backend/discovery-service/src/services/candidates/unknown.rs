use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{CandidateSource, SourceQuery};
use crate::config::CandidateConfig;
use crate::error::Result;
use crate::models::{Candidate, CandidateKind};
use crate::stores::{MetricsSink, PopulationStore};

/// Samples the broader filtered population outside the searcher's graph.
///
/// Emits weight 0.0 for every candidate: unknown subjects carry no
/// retrieval-time signal, and all scoring happens in the ranking stage.
/// No cache either; the population changes independently of any single
/// user's queries.
pub struct UnknownCandidateSource {
    population: Arc<dyn PopulationStore>,
    metrics: Arc<dyn MetricsSink>,
    config: CandidateConfig,
}

impl UnknownCandidateSource {
    pub fn new(
        population: Arc<dyn PopulationStore>,
        metrics: Arc<dyn MetricsSink>,
        config: CandidateConfig,
    ) -> Self {
        Self {
            population,
            metrics,
            config,
        }
    }
}

#[async_trait]
impl CandidateSource for UnknownCandidateSource {
    async fn find(
        &self,
        user_id: Uuid,
        query: &SourceQuery,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let sample_limit = self.config.unknown_sample_limit;
        let ids = self
            .population
            .sample(user_id, &query.filters, sample_limit)
            .await?;

        let cap = limit.min(self.config.max_results);
        let mut seen: HashSet<Uuid> = HashSet::with_capacity(ids.len());
        let candidates: Vec<Candidate> = ids
            .into_iter()
            .filter(|id| *id != user_id && seen.insert(*id))
            .take(cap)
            .map(|subject_id| Candidate {
                subject_id,
                weight: 0.0,
                is_premium: false,
                source: CandidateKind::Unknown,
            })
            .collect();

        self.metrics
            .record_count("unknown_source_candidates", candidates.len() as u64);
        debug!(
            user_id = %user_id,
            count = candidates.len(),
            "unknown candidate retrieval completed"
        );
        Ok(candidates)
    }

    fn kind(&self) -> CandidateKind {
        CandidateKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchFilters;
    use crate::stores::InMemoryMetrics;

    struct FakePopulationStore {
        ids: Vec<Uuid>,
    }

    #[async_trait]
    impl PopulationStore for FakePopulationStore {
        async fn sample(
            &self,
            exclude_user_id: Uuid,
            _filters: &SearchFilters,
            limit: usize,
        ) -> Result<Vec<Uuid>> {
            Ok(self
                .ids
                .iter()
                .filter(|id| **id != exclude_user_id)
                .take(limit)
                .copied()
                .collect())
        }
    }

    fn source(ids: Vec<Uuid>) -> UnknownCandidateSource {
        UnknownCandidateSource::new(
            Arc::new(FakePopulationStore { ids }),
            Arc::new(InMemoryMetrics::new()),
            CandidateConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_emits_zero_weight() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let found = source(ids)
            .find(Uuid::new_v4(), &SourceQuery::default(), 20)
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.weight == 0.0));
        assert!(found.iter().all(|c| c.source == CandidateKind::Unknown));
    }

    #[tokio::test]
    async fn test_dedup_and_limit() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let found = source(vec![a, a, b, c])
            .find(Uuid::new_v4(), &SourceQuery::default(), 2)
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].subject_id, a);
        assert_eq!(found[1].subject_id, b);
    }

    #[tokio::test]
    async fn test_excludes_searcher() {
        let searcher = Uuid::new_v4();
        let other = Uuid::new_v4();
        let found = source(vec![searcher, other])
            .find(searcher, &SourceQuery::default(), 20)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subject_id, other);
    }
}
