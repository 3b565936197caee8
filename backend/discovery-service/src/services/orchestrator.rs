//! Search orchestration
//!
//! Single entry point for a people-search request: validation, rate
//! limiting, result caching, parallel candidate retrieval, hydration,
//! ranking, sorting and pagination. Errors from any stage surface as
//! `SearchError` so the transport layer can map them uniformly.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, SearchError};
use crate::models::{
    Candidate, HydratedCandidate, PaginationInfo, RankingResult, SearchFilters, SearchMetadata,
    SearchRequest, SearchResponse, SearchType, SortDirection, SortField, Sorting,
};
use crate::services::cache::{search_cache_key, SearchCache};
use crate::services::candidates::{CandidateSource, SourceQuery};
use crate::services::hydration::{HydrationKind, HydrationService};
use crate::services::ranking::{RankingCriteria, RankingEngine};
use crate::stores::MetricsSink;

pub struct SearchOrchestrator {
    related: Arc<dyn CandidateSource>,
    unknown: Arc<dyn CandidateSource>,
    hydration: Arc<HydrationService>,
    ranking: Arc<RankingEngine>,
    metrics: Arc<dyn MetricsSink>,
    result_cache: SearchCache<SearchResponse>,
    suggestion_cache: SearchCache<Vec<RankingResult>>,
    // user -> (window minute, requests in window); shared with the
    // pruner task so stale windows do not accumulate per user
    rate_windows: Arc<DashMap<Uuid, (i64, u32)>>,
    config: Config,
}

impl SearchOrchestrator {
    pub fn new(
        related: Arc<dyn CandidateSource>,
        unknown: Arc<dyn CandidateSource>,
        hydration: Arc<HydrationService>,
        ranking: Arc<RankingEngine>,
        metrics: Arc<dyn MetricsSink>,
        config: Config,
    ) -> Self {
        let result_cache = SearchCache::new(
            config.cache.max_size,
            Duration::from_secs(config.search.result_ttl_secs),
        );
        let suggestion_cache = SearchCache::new(
            config.cache.max_size,
            Duration::from_secs(config.search.suggestion_ttl_secs),
        );
        Self {
            related,
            unknown,
            hydration,
            ranking,
            metrics,
            result_cache,
            suggestion_cache,
            rate_windows: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Background expiry for both caches and the rate-limit windows
    pub fn spawn_cache_sweepers(&self) -> Vec<JoinHandle<()>> {
        let interval = Duration::from_secs(self.config.cache.sweep_interval_secs);
        let windows = Arc::clone(&self.rate_windows);
        let window_pruner = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                prune_rate_windows(&windows, Utc::now().timestamp() / 60);
            }
        });
        vec![
            self.result_cache.spawn_sweeper(interval),
            self.suggestion_cache.spawn_sweeper(interval),
            window_pruner,
        ]
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();

        self.validate(request)?;
        self.check_rate_limit(request.searcher_user_id)?;

        let limit = request
            .pagination
            .limit
            .unwrap_or(self.config.search.default_limit)
            .min(self.config.search.max_limit);
        let offset = request.pagination.offset.unwrap_or(0);

        let cache_key = search_cache_key("search", request, limit, offset);
        if let Some(mut cached) = self.result_cache.get(&cache_key) {
            self.metrics.record_count("search_cache_hit", 1);
            cached.search_metadata.cache_hit = true;
            cached.search_metadata.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(cached);
        }
        self.metrics.record_count("search_cache_miss", 1);

        let timeout = Duration::from_millis(self.config.search.timeout_ms);
        let results = match tokio::time::timeout(timeout, self.execute(request)).await {
            Ok(results) => results?,
            Err(_) => {
                self.metrics.record_error("search_timeout");
                warn!(
                    searcher = %request.searcher_user_id,
                    timeout_ms = self.config.search.timeout_ms,
                    "search timed out"
                );
                return Err(SearchError::Timeout(self.config.search.timeout_ms));
            }
        };

        let response = self.paginate(results, &request.sorting, limit, offset, started);
        self.result_cache.set(&cache_key, response.clone(), None);

        let duration = started.elapsed();
        self.metrics
            .record_duration("search", duration.as_millis() as u64);
        info!(
            searcher = %request.searcher_user_id,
            search_type = request.search_type.as_str(),
            total = response.pagination.total,
            duration_ms = duration.as_millis() as u64,
            "search completed"
        );
        Ok(response)
    }

    /// Prefix-style typeahead over the related graph only. Subject to the
    /// same per-user rate limit as full search.
    pub async fn suggestions(
        &self,
        user_id: Uuid,
        term: &str,
        limit: usize,
    ) -> Result<Vec<RankingResult>> {
        if user_id.is_nil() {
            return Err(SearchError::PermissionDenied(
                "suggestions require an authenticated user".into(),
            ));
        }
        let normalized = term.trim();
        if normalized.chars().count() < self.config.search.min_suggestion_len {
            return Err(SearchError::Validation(format!(
                "suggestion term must be at least {} characters",
                self.config.search.min_suggestion_len
            )));
        }
        self.check_rate_limit(user_id)?;

        let cache_key = format!("suggest:{}:{}:{}", user_id, normalized, limit);
        if let Some(cached) = self.suggestion_cache.get(&cache_key) {
            self.metrics.record_count("suggestion_cache_hit", 1);
            return Ok(cached);
        }
        self.metrics.record_count("suggestion_cache_miss", 1);

        let query = SourceQuery {
            term: normalized.to_string(),
            filters: SearchFilters::default(),
        };
        let candidates = self.related.find(user_id, &query, limit).await?;
        let hydrated = self
            .hydration
            .hydrate(user_id, &candidates, HydrationKind::Related)
            .await?;

        let criteria = RankingCriteria {
            term: normalized.to_string(),
            search_type: SearchType::Related,
        };
        let mut results = self.ranking.rank(hydrated, &criteria);
        results.truncate(limit);

        self.suggestion_cache.set(&cache_key, results.clone(), None);
        Ok(results)
    }

    fn validate(&self, request: &SearchRequest) -> Result<()> {
        if request.searcher_user_id.is_nil() {
            return Err(SearchError::PermissionDenied(
                "search requires an authenticated user".into(),
            ));
        }

        let term = request.term.trim();
        if term.is_empty() {
            return Err(SearchError::Validation("search term must not be empty".into()));
        }
        if term.chars().count() > self.config.search.max_term_len {
            return Err(SearchError::Validation(format!(
                "search term exceeds {} characters",
                self.config.search.max_term_len
            )));
        }
        if term.chars().any(|c| c.is_control()) {
            return Err(SearchError::Validation(
                "search term contains control characters".into(),
            ));
        }
        Ok(())
    }

    /// Fixed one-minute window per user
    fn check_rate_limit(&self, user_id: Uuid) -> Result<()> {
        let minute = Utc::now().timestamp() / 60;
        let mut window = self.rate_windows.entry(user_id).or_insert((minute, 0));
        if window.0 != minute {
            *window = (minute, 0);
        }
        if window.1 >= self.config.search.rate_limit_per_minute {
            self.metrics.record_count("search_rate_limited", 1);
            return Err(SearchError::RateLimitExceeded(user_id));
        }
        window.1 += 1;
        Ok(())
    }

    /// Retrieval, hydration and ranking; runs under the request timeout
    async fn execute(&self, request: &SearchRequest) -> Result<Vec<RankingResult>> {
        let searcher = request.searcher_user_id;
        let query = SourceQuery {
            term: request.term.trim().to_string(),
            filters: request.filters.clone(),
        };
        let fetch = self.config.search.max_candidates;

        let (related, unknown) = match request.search_type {
            SearchType::Related => (self.related.find(searcher, &query, fetch).await?, Vec::new()),
            SearchType::Unknown => (Vec::new(), self.unknown.find(searcher, &query, fetch).await?),
            _ => {
                let (related, unknown) = tokio::join!(
                    self.related.find(searcher, &query, fetch),
                    self.unknown.find(searcher, &query, fetch)
                );
                (related?, unknown?)
            }
        };

        // Related wins overlaps; the combined set is capped before hydration
        let mut seen: std::collections::HashSet<Uuid> =
            related.iter().map(|c| c.subject_id).collect();
        let mut related: Vec<Candidate> = related;
        related.truncate(fetch);
        let room = fetch - related.len();
        let unknown: Vec<Candidate> = unknown
            .into_iter()
            .filter(|c| seen.insert(c.subject_id))
            .take(room)
            .collect();

        debug!(
            searcher = %searcher,
            related = related.len(),
            unknown = unknown.len(),
            "candidate retrieval completed"
        );

        let (mut hydrated, unknown_hydrated) = tokio::try_join!(
            self.hydration
                .hydrate(searcher, &related, HydrationKind::Related),
            self.hydration
                .hydrate(searcher, &unknown, HydrationKind::Unknown),
        )?;
        hydrated.extend(unknown_hydrated);

        apply_filters(&mut hydrated, &request.filters);

        let criteria = RankingCriteria {
            term: request.term.trim().to_string(),
            search_type: request.search_type,
        };
        Ok(self.ranking.rank(hydrated, &criteria))
    }

    fn paginate(
        &self,
        mut results: Vec<RankingResult>,
        sorting: &Sorting,
        limit: u32,
        offset: u32,
        started: Instant,
    ) -> SearchResponse {
        apply_sorting(&mut results, sorting);

        let total = results.len() as u32;
        let users: Vec<RankingResult> = results
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        SearchResponse {
            users,
            pagination: PaginationInfo {
                total,
                limit,
                offset,
                has_next: offset.saturating_add(limit) < total,
                has_previous: offset > 0,
            },
            search_metadata: SearchMetadata {
                query_id: Uuid::new_v4(),
                duration_ms: started.elapsed().as_millis() as u64,
                cache_hit: false,
            },
        }
    }
}

/// Drop windows from past minutes; current-minute windows stay intact
fn prune_rate_windows(windows: &DashMap<Uuid, (i64, u32)>, current_minute: i64) {
    windows.retain(|_, (window_minute, _)| *window_minute == current_minute);
}

fn apply_filters(hydrated: &mut Vec<HydratedCandidate>, filters: &SearchFilters) {
    if filters.verified_only {
        hydrated.retain(|c| c.is_verified);
    }
    if let Some(min_followers) = filters.min_followers {
        hydrated.retain(|c| c.follower_count >= min_followers);
    }
    if let Some(max_distance) = filters.max_distance_km {
        hydrated.retain(|c| matches!(c.distance_km, Some(d) if d <= max_distance));
    }
}

/// Re-sort ranked results when the caller overrides the default score
/// ordering. Ties keep their rank order; subjects without a distance sort
/// last in either direction.
fn apply_sorting(results: &mut [RankingResult], sorting: &Sorting) {
    let ascending = sorting.direction == SortDirection::Asc;
    match sorting.field {
        SortField::Score => {
            if ascending {
                results.sort_by(|a, b| {
                    a.score
                        .partial_cmp(&b.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        }
        SortField::Followers => {
            results.sort_by(|a, b| {
                let ord = a.subject.follower_count.cmp(&b.subject.follower_count);
                if ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        SortField::Distance => {
            results.sort_by(|a, b| match (a.subject.distance_km, b.subject.distance_km) {
                (Some(x), Some(y)) => {
                    let ord = x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
                    if ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                }
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
    }
}
