//! Retention scoring shared by consolidation and pruning.

use chrono::{DateTime, Utc};

use crate::entry::MemoryEntry;

/// Weighted retention score for `entry` at time `now`.
///
/// Combines importance, access frequency (log-damped), recency of access
/// (decaying over hours), and age (decaying over days):
///
/// ```text
/// importance * 0.4
///   + (ln(1 + access_count) / 10)                  * 0.3
///   + (1 / (1 + since_last_access_ms / 1h_in_ms))  * 0.2
///   + (1 / (1 + since_created_ms / 1d_in_ms))      * 0.1
/// ```
///
/// Higher scores are retained; lower scores are consolidated out of
/// short-term or pruned from long-term.
pub fn retention_score(entry: &MemoryEntry, now: DateTime<Utc>) -> f64 {
    const HOUR_MS: f64 = 3_600_000.0;
    const DAY_MS: f64 = 86_400_000.0;

    let importance_factor = f64::from(entry.importance);
    let access_factor = (1.0 + entry.access_count as f64).ln() / 10.0;

    let since_access = (now - entry.last_accessed_at).num_milliseconds().max(0) as f64;
    let recency_factor = 1.0 / (1.0 + since_access / HOUR_MS);

    let since_created = (now - entry.created_at).num_milliseconds().max(0) as f64;
    let age_factor = 1.0 / (1.0 + since_created / DAY_MS);

    importance_factor * 0.4 + access_factor * 0.3 + recency_factor * 0.2 + age_factor * 0.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryDraft;
    use chrono::Duration;

    fn entry_with(importance: f32, now: DateTime<Utc>) -> MemoryEntry {
        EntryDraft::new("x")
            .with_importance(importance)
            .into_entry(vec![], now)
    }

    #[test]
    fn fresh_entry_scores_importance_plus_full_recency() {
        let now = Utc::now();
        let entry = entry_with(1.0, now);
        let score = retention_score(&entry, now);
        // 0.4 importance + 0 access + 0.2 recency + 0.1 age
        assert!((score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn higher_importance_scores_higher() {
        let now = Utc::now();
        let low = entry_with(0.1, now);
        let high = entry_with(0.9, now);
        assert!(retention_score(&high, now) > retention_score(&low, now));
    }

    #[test]
    fn access_count_raises_score() {
        let now = Utc::now();
        let mut accessed = entry_with(0.5, now);
        let untouched = entry_with(0.5, now);
        for _ in 0..10 {
            accessed.touch(now);
        }
        assert!(retention_score(&accessed, now) > retention_score(&untouched, now));
    }

    #[test]
    fn staleness_decays_score() {
        let now = Utc::now();
        let fresh = entry_with(0.5, now);
        let stale = entry_with(0.5, now - Duration::days(7));
        assert!(retention_score(&fresh, now) > retention_score(&stale, now));
    }

    #[test]
    fn clock_skew_does_not_inflate_score() {
        // An entry stamped in the future must not score above a fresh one.
        let now = Utc::now();
        let future = entry_with(0.5, now + Duration::hours(1));
        let fresh = entry_with(0.5, now);
        assert!(retention_score(&future, now) <= retention_score(&fresh, now) + 1e-9);
    }
}
