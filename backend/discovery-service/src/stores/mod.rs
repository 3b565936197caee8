//! Collaborator contracts consumed by the discovery core
//!
//! Implementations live in other services (graph, profile, clustering
//! pipeline). The core only depends on these traits; tests supply
//! in-memory fakes.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use geo_utils::Coordinates;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ClusterAssignment, ContentCluster, EmbeddingSource, InteractionSignal, Profile, SearchFilters,
};

#[derive(Debug, Clone)]
pub struct WeightedNeighbor {
    pub subject_id: Uuid,
    pub weight: f32,
}

/// Graph-weighted relation store (follows, swipes, contact overlap)
#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn weighted_neighbors(
        &self,
        user_id: Uuid,
        min_weight: f32,
        limit: usize,
    ) -> Result<Vec<WeightedNeighbor>>;
}

/// Broad filtered population for unknown-candidate retrieval
#[async_trait]
pub trait PopulationStore: Send + Sync {
    async fn sample(
        &self,
        exclude_user_id: Uuid,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Uuid>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>>;

    async fn get_coordinates(&self, user_id: Uuid) -> Result<Option<Coordinates>>;

    /// Does `follower` follow `followee`?
    async fn get_follow_status(&self, follower: Uuid, followee: Uuid) -> Result<bool>;

    /// Has `blocker` blocked `blocked`?
    async fn get_block_status(&self, blocker: Uuid, blocked: Uuid) -> Result<bool>;
}

/// Read access to the offline clustering pipeline's output
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<ContentCluster>>;

    async fn assignments_for(&self, content_id: Uuid) -> Result<Vec<ClusterAssignment>>;
}

/// Interaction history feed for embedding generation
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn recent_interactions(
        &self,
        owner_id: Uuid,
        source: EmbeddingSource,
        max_count: usize,
        window: Duration,
    ) -> Result<Vec<InteractionSignal>>;
}

/// Metrics collaborator. Recording never fails and never suspends.
pub trait MetricsSink: Send + Sync {
    fn record_duration(&self, name: &str, ms: u64);
    fn record_count(&self, name: &str, n: u64);
    fn record_error(&self, msg: &str);
}

/// Sink that drops everything; default for callers that don't care
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_duration(&self, _name: &str, _ms: u64) {}
    fn record_count(&self, _name: &str, _n: u64) {}
    fn record_error(&self, _msg: &str) {}
}

/// In-process sink backed by concurrent maps. Used by tests and by
/// deployments that scrape counters out-of-band.
#[derive(Default)]
pub struct InMemoryMetrics {
    counts: DashMap<String, u64>,
    durations: DashMap<String, Vec<u64>>,
    errors: Mutex<Vec<String>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).map(|v| *v).unwrap_or(0)
    }

    pub fn durations(&self, name: &str) -> Vec<u64> {
        self.durations.get(name).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("metrics errors lock poisoned").clone()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_duration(&self, name: &str, ms: u64) {
        self.durations.entry(name.to_string()).or_default().push(ms);
    }

    fn record_count(&self, name: &str, n: u64) {
        *self.counts.entry(name.to_string()).or_insert(0) += n;
    }

    fn record_error(&self, msg: &str) {
        self.errors
            .lock()
            .expect("metrics errors lock poisoned")
            .push(msg.to_string());
    }
}

/// Snapshot of counters, handy for health endpoints
impl InMemoryMetrics {
    pub fn counts_snapshot(&self) -> HashMap<String, u64> {
        self.counts
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }
}
