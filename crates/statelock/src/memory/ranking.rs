//! Hybrid similarity and recency ranking
//!
//! Candidates come from an over-fetched similarity search. Each gets a
//! similarity in (0, 1] from its raw distance and a recency in [0, 1]
//! normalized across the candidate set; the blended score orders them.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::error::{Result, StateLockError};
use crate::memory::types::RankedMemory;

/// Age given to candidates without a usable creation time
pub const UNKNOWN_AGE_HOURS: f64 = 1e9;

/// Blend weights for similarity and recency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub similarity: f64,
    pub recency: f64,
}

impl RankingWeights {
    pub fn new(similarity: f64, recency: f64) -> Self {
        Self {
            similarity,
            recency,
        }
    }

    /// The weight sum must be strictly positive. NaN sums are rejected too.
    pub fn validate(&self) -> Result<()> {
        let sum = self.similarity + self.recency;
        if !(sum > 0.0) {
            return Err(StateLockError::Validation(
                "recency_weight + similarity_weight must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// How many candidates to fetch before re-ranking
pub fn candidate_count(top_k: usize, candidate_k: usize, multiplier: usize, ceiling: usize) -> usize {
    top_k
        .max(candidate_k)
        .max(top_k.saturating_mul(multiplier))
        .min(ceiling)
}

/// `1 / (1 + distance)`; a missing distance counts as 1
pub fn similarity_from_distance(distance: Option<f64>) -> f64 {
    let distance = distance.unwrap_or(1.0).max(0.0);
    1.0 / (1.0 + distance)
}

/// Hours from `created_at` to `now`, never negative
pub fn age_hours(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match created_at {
        Some(created) => {
            let seconds = (now - created).num_milliseconds() as f64 / 1000.0;
            (seconds / 3600.0).max(0.0)
        }
        None => UNKNOWN_AGE_HOURS,
    }
}

/// Min/max normalize ages so the newest maps to 1.0 and the oldest to 0.0.
/// When every age is equal, every recency is 1.0.
pub fn normalize_recency(ages: &[f64]) -> Vec<f64> {
    let min_age = ages.iter().copied().fold(f64::INFINITY, f64::min);
    let max_age = ages.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if ages.is_empty() || max_age == min_age {
        return vec![1.0; ages.len()];
    }

    let span = max_age - min_age;
    ages.iter().map(|age| 1.0 - (age - min_age) / span).collect()
}

/// Score every candidate and return the best `top_k`, ordered
pub fn rank(
    mut candidates: Vec<RankedMemory>,
    weights: RankingWeights,
    top_k: usize,
    now: DateTime<Utc>,
) -> Vec<RankedMemory> {
    if candidates.is_empty() {
        return candidates;
    }

    let ages: Vec<f64> = candidates
        .iter()
        .map(|c| age_hours(c.record.created_at, now))
        .collect();
    let recencies = normalize_recency(&ages);

    for (candidate, recency) in candidates.iter_mut().zip(recencies) {
        let similarity = similarity_from_distance(candidate.distance);
        candidate.score = Some(weights.similarity * similarity + weights.recency * recency);
    }

    candidates.sort_by(compare_ranked);
    candidates.truncate(top_k);
    candidates
}

/// Score descending, then last write descending, then id ascending
pub fn compare_ranked(a: &RankedMemory, b: &RankedMemory) -> Ordering {
    let score_a = a.score.unwrap_or(0.0);
    let score_b = b.score.unwrap_or(0.0);

    score_b
        .total_cmp(&score_a)
        .then_with(|| tie_break_time(b).cmp(&tie_break_time(a)))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

fn tie_break_time(ranked: &RankedMemory) -> DateTime<Utc> {
    ranked.record.last_written().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryRecord;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn candidate(id: &str, distance: Option<f64>, age_hours: Option<i64>) -> RankedMemory {
        let created_at = age_hours.map(|h| now() - Duration::hours(h));
        RankedMemory {
            record: MemoryRecord {
                id: id.to_string(),
                content: id.to_string(),
                name: None,
                session_id: "s".to_string(),
                tags: Vec::new(),
                external_id: None,
                created_at,
                updated_at: created_at,
            },
            distance,
            score: None,
        }
    }

    #[test]
    fn test_candidate_count() {
        assert_eq!(candidate_count(3, 25, 5, 500), 25);
        assert_eq!(candidate_count(10, 25, 5, 500), 50);
        assert_eq!(candidate_count(40, 1, 1, 500), 40);
        assert_eq!(candidate_count(200, 25, 5, 500), 500);
        assert_eq!(candidate_count(usize::MAX, 0, 5, 500), 500);
    }

    #[test]
    fn test_similarity_from_distance() {
        assert_eq!(similarity_from_distance(Some(0.0)), 1.0);
        assert_eq!(similarity_from_distance(Some(1.0)), 0.5);
        assert_eq!(similarity_from_distance(None), 0.5);
        assert_eq!(similarity_from_distance(Some(-3.0)), 1.0);
    }

    #[test]
    fn test_recency_normalization() {
        assert_eq!(normalize_recency(&[0.0, 10.0, 20.0]), vec![1.0, 0.5, 0.0]);
        assert_eq!(normalize_recency(&[5.0, 5.0]), vec![1.0, 1.0]);
        assert!(normalize_recency(&[]).is_empty());
    }

    #[test]
    fn test_age_hours() {
        assert_eq!(age_hours(Some(now() - Duration::hours(10)), now()), 10.0);
        assert_eq!(age_hours(Some(now() + Duration::hours(1)), now()), 0.0);
        assert_eq!(age_hours(None, now()), UNKNOWN_AGE_HOURS);
    }

    #[test]
    fn test_weights_validation() {
        assert!(RankingWeights::new(0.0, 0.0).validate().is_err());
        assert!(RankingWeights::new(f64::NAN, 1.0).validate().is_err());
        assert!(RankingWeights::new(0.0, 0.1).validate().is_ok());
    }

    #[test]
    fn test_recency_reorders_equal_similarity() {
        let ranked = rank(
            vec![
                candidate("old", Some(0.5), Some(20)),
                candidate("new", Some(0.5), Some(0)),
                candidate("mid", Some(0.5), Some(10)),
            ],
            RankingWeights::new(0.5, 0.5),
            3,
            now(),
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_similarity_only_ignores_age() {
        let ranked = rank(
            vec![
                candidate("new_far", Some(3.0), Some(0)),
                candidate("old_near", Some(0.0), Some(100)),
            ],
            RankingWeights::new(1.0, 0.0),
            2,
            now(),
        );
        assert_eq!(ranked[0].record.id, "old_near");
        assert_eq!(ranked[0].score, Some(1.0));
        assert_eq!(ranked[1].score, Some(0.25));
    }

    #[test]
    fn test_unknown_timestamp_never_wins_recency() {
        let ranked = rank(
            vec![
                candidate("unknown", Some(0.0), None),
                candidate("dated", Some(0.0), Some(1000)),
            ],
            RankingWeights::new(0.0, 1.0),
            2,
            now(),
        );
        assert_eq!(ranked[0].record.id, "dated");
        assert_eq!(ranked[1].score, Some(0.0));
    }

    #[test]
    fn test_ties_break_on_time_then_id() {
        let mut b = candidate("b", Some(0.0), Some(5));
        let mut a = candidate("a", Some(0.0), Some(5));
        let c = candidate("c", Some(0.0), Some(5));
        // same created_at, so recency ties; updated_at decides
        b.record.updated_at = Some(now());
        a.record.updated_at = None;

        let ranked = rank(
            vec![c.clone(), a.clone(), b.clone()],
            RankingWeights::new(0.8, 0.2),
            3,
            now(),
        );
        let ids: Vec<&str> = ranked.iter().map(|r| r.record.id.as_str()).collect();
        // b updated latest; c and a fall back to the same created_at, so id decides
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let ranked = rank(
            (0..10)
                .map(|i| candidate(&format!("r{i}"), Some(i as f64), Some(i)))
                .collect(),
            RankingWeights::new(0.8, 0.2),
            3,
            now(),
        );
        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
