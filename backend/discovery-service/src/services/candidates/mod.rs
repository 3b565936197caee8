//! Candidate retrieval strategies
//!
//! Two independent sources composed by the orchestrator: `Related` walks
//! the weighted relation graph, `Unknown` samples the broader filtered
//! population. Both emit bounded, deduplicated `Candidate` lists.

mod related;
mod unknown;

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

pub use related::RelatedCandidateSource;
pub use unknown::UnknownCandidateSource;

use crate::error::Result;
use crate::models::{Candidate, CandidateKind, SearchFilters};

/// Query context shared by all sources for one request
#[derive(Debug, Clone, Default)]
pub struct SourceQuery {
    /// Raw term as typed by the searcher
    pub term: String,
    pub filters: SearchFilters,
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn find(&self, user_id: Uuid, query: &SourceQuery, limit: usize)
        -> Result<Vec<Candidate>>;

    fn kind(&self) -> CandidateKind;
}

/// Drop duplicate subject ids, keeping the first occurrence
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.subject_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: Uuid, weight: f32) -> Candidate {
        Candidate {
            subject_id: id,
            weight,
            is_premium: false,
            source: CandidateKind::Related,
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let deduped = dedup_candidates(vec![
            candidate(a, 0.9),
            candidate(b, 0.5),
            candidate(a, 0.1),
        ]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].subject_id, a);
        assert_eq!(deduped[0].weight, 0.9);
        assert_eq!(deduped[1].subject_id, b);
    }
}
