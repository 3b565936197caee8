//! Multi-factor ranking engine
//!
//! Scores hydrated candidates on six normalized factors, applies
//! query-type contextual adjustments and a minimum-score filter, and
//! assigns strict gapless ranks. Ties keep the original retrieval order
//! (stable sort), so retrieval weight decides between otherwise equal
//! candidates.

use std::cmp::Ordering;

use tracing::debug;

use crate::config::RankingConfig;
use crate::models::{FactorBreakdown, HydratedCandidate, RankingResult, SearchType};

/// Field weights for the relevance factor
const USERNAME_FIELD_WEIGHT: f32 = 1.0;
const DISPLAY_NAME_FIELD_WEIGHT: f32 = 0.8;
const BIO_FIELD_WEIGHT: f32 = 0.5;

/// Match strengths: exact > prefix > substring
const EXACT_MATCH: f32 = 1.0;
const PREFIX_MATCH: f32 = 0.7;
const SUBSTRING_MATCH: f32 = 0.4;

/// Log-scale normalization ceilings
const FOLLOWER_SCALE_CEILING: f32 = 1_000_000.0;
const CONTENT_SCALE_CEILING: f32 = 10_000.0;

/// Damping factors
const MUTED_DAMPING: f32 = 0.3;
const INACTIVE_DAMPING: f32 = 0.1;

/// High-quality view: score AND verification AND engagement AND audience
const HIGH_QUALITY_MIN_SCORE: f32 = 70.0;
const HIGH_QUALITY_MIN_ENGAGEMENT: f32 = 0.05;
const HIGH_QUALITY_MIN_FOLLOWERS: u32 = 1_000;

/// Influencer view: score AND audience AND engagement
const INFLUENCER_MIN_SCORE: f32 = 60.0;
const INFLUENCER_MIN_FOLLOWERS: u32 = 10_000;
const INFLUENCER_MIN_ENGAGEMENT: f32 = 0.02;

#[derive(Debug, Clone)]
pub struct RankingCriteria {
    pub term: String,
    pub search_type: SearchType,
}

pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Score, adjust, filter and rank hydrated candidates
    pub fn rank(
        &self,
        hydrated: Vec<HydratedCandidate>,
        criteria: &RankingCriteria,
    ) -> Vec<RankingResult> {
        let input_count = hydrated.len();
        let term = criteria.term.trim().to_lowercase();

        let mut results: Vec<RankingResult> = hydrated
            .into_iter()
            .map(|subject| {
                let factors = self.compute_factors(&subject, &term);
                let score = self.weighted_score(&factors);
                RankingResult {
                    subject,
                    score,
                    factors,
                    rank: 0,
                }
            })
            .collect();

        self.apply_contextual_adjustment(&mut results, criteria.search_type);

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.retain(|r| r.score >= self.config.min_score);

        for (i, result) in results.iter_mut().enumerate() {
            result.rank = (i + 1) as u32;
        }

        debug!(
            input_count,
            output_count = results.len(),
            search_type = criteria.search_type.as_str(),
            "ranking completed"
        );
        results
    }

    fn compute_factors(&self, candidate: &HydratedCandidate, term: &str) -> FactorBreakdown {
        FactorBreakdown {
            relevance: self.relevance_factor(candidate, term),
            social: self.social_factor(candidate),
            engagement: self.engagement_factor(candidate),
            proximity: self.proximity_factor(candidate),
            verification: self.verification_factor(candidate),
            content: self.content_factor(candidate),
        }
    }

    fn weighted_score(&self, factors: &FactorBreakdown) -> f32 {
        let weights = &self.config.weights;
        let score = weights.relevance * factors.relevance
            + weights.social * factors.social
            + weights.engagement * factors.engagement
            + weights.proximity * factors.proximity
            + weights.verification * factors.verification
            + weights.content * factors.content;
        (score * 100.0).clamp(0.0, 100.0)
    }

    /// String-match strength across username, display name and bio,
    /// each weighted per field; the strongest field wins.
    fn relevance_factor(&self, candidate: &HydratedCandidate, term: &str) -> f32 {
        if term.is_empty() {
            return 0.0;
        }

        let fields = [
            (candidate.username.to_lowercase(), USERNAME_FIELD_WEIGHT),
            (
                candidate.display_name.to_lowercase(),
                DISPLAY_NAME_FIELD_WEIGHT,
            ),
            (candidate.bio.to_lowercase(), BIO_FIELD_WEIGHT),
        ];

        fields
            .iter()
            .map(|(text, field_weight)| Self::match_strength(text, term) * field_weight)
            .fold(0.0_f32, f32::max)
            .clamp(0.0, 1.0)
    }

    fn match_strength(text: &str, term: &str) -> f32 {
        if text == term {
            EXACT_MATCH
        } else if text.starts_with(term) {
            PREFIX_MATCH
        } else if text.contains(term) {
            SUBSTRING_MATCH
        } else {
            0.0
        }
    }

    /// Relationship strength: mutual > follows-you > you-follow, plus a
    /// log-scaled follower bonus. A block in either direction zeroes the
    /// whole factor; muting damps it.
    fn social_factor(&self, candidate: &HydratedCandidate) -> f32 {
        if candidate.is_blocked() {
            return 0.0;
        }

        let relationship = if candidate.you_follow && candidate.follows_you {
            1.0
        } else if candidate.follows_you {
            0.7
        } else if candidate.you_follow {
            0.4
        } else {
            0.0
        };

        let follower_bonus = (1.0 + candidate.follower_count as f32).ln()
            / (1.0 + FOLLOWER_SCALE_CEILING).ln();
        let mut score = relationship * 0.7 + follower_bonus.min(1.0) * 0.3;

        if candidate.is_muted {
            score *= MUTED_DAMPING;
        }
        score.clamp(0.0, 1.0)
    }

    /// Log-scaled activity volume (damped when inactive) plus raw
    /// engagement rate
    fn engagement_factor(&self, candidate: &HydratedCandidate) -> f32 {
        let mut activity = (1.0 + candidate.content_count as f32).ln()
            / (1.0 + CONTENT_SCALE_CEILING).ln();
        if !candidate.is_active {
            activity *= INACTIVE_DAMPING;
        }

        let rate = candidate.engagement_rate.clamp(0.0, 1.0);
        (activity.min(1.0) * 0.6 + rate * 0.4).clamp(0.0, 1.0)
    }

    /// Distance normalized against the configured radius; neutral 0.5
    /// when no distance is available
    fn proximity_factor(&self, candidate: &HydratedCandidate) -> f32 {
        match candidate.distance_km {
            Some(d) => (1.0 - (d / self.config.max_radius_km).clamp(0.0, 1.0)) as f32,
            None => 0.5,
        }
    }

    fn verification_factor(&self, candidate: &HydratedCandidate) -> f32 {
        let base = if candidate.is_verified { 0.7 } else { 0.0 };
        (base + candidate.reputation_score.clamp(0.0, 1.0) * 0.3).clamp(0.0, 1.0)
    }

    fn content_factor(&self, candidate: &HydratedCandidate) -> f32 {
        ((1.0 + candidate.content_count as f32).ln() / (1.0 + CONTENT_SCALE_CEILING).ln())
            .clamp(0.0, 1.0)
    }

    /// Query-type-specific re-weighting after base scoring
    fn apply_contextual_adjustment(&self, results: &mut Vec<RankingResult>, ty: SearchType) {
        match ty {
            SearchType::Related => {
                for r in results.iter_mut() {
                    r.score = (r.score * (1.0 + r.factors.social * 0.3)).min(100.0);
                }
            }
            SearchType::Nearby => {
                results.retain(|r| r.subject.distance_km.is_some());
                for r in results.iter_mut() {
                    r.score = (r.score * (1.0 + r.factors.proximity * 0.6)).min(100.0);
                }
            }
            SearchType::Verified => {
                results.retain(|r| r.subject.is_verified);
                for r in results.iter_mut() {
                    r.score = (r.score * (1.0 + r.factors.verification * 0.5)).min(100.0);
                }
            }
            SearchType::All | SearchType::Unknown => {}
        }
    }

    /// Read-only view over an already-ranked list; does not mutate it
    pub fn high_quality<'a>(&self, results: &'a [RankingResult]) -> Vec<&'a RankingResult> {
        results
            .iter()
            .filter(|r| {
                r.score >= HIGH_QUALITY_MIN_SCORE
                    && r.subject.is_verified
                    && r.subject.engagement_rate >= HIGH_QUALITY_MIN_ENGAGEMENT
                    && r.subject.follower_count >= HIGH_QUALITY_MIN_FOLLOWERS
            })
            .collect()
    }

    /// Read-only view over an already-ranked list; does not mutate it
    pub fn influencers<'a>(&self, results: &'a [RankingResult]) -> Vec<&'a RankingResult> {
        results
            .iter()
            .filter(|r| {
                r.score >= INFLUENCER_MIN_SCORE
                    && r.subject.follower_count >= INFLUENCER_MIN_FOLLOWERS
                    && r.subject.engagement_rate >= INFLUENCER_MIN_ENGAGEMENT
            })
            .collect()
    }
}
