//! Observation staleness detection.
//!
//! Stations normally issue a METAR every hour, plus specials when conditions
//! change. A report that is several hours old usually means the station's
//! sensors or uplink are down, and a map showing it as current is
//! misleading. The display marks such reports, and the refresh loop logs
//! them.
//!
//! # Clock injection
//! All functions accept a `now: DateTime<Utc>` parameter rather than calling
//! `Utc::now()` internally, so tests are deterministic without mocking.

use chrono::{DateTime, Utc};

use crate::model::{ConditionMap, StationCondition};

/// Age of the observation in whole minutes. Observations stamped in the
/// future (clock skew) count as zero minutes old.
pub fn observation_age_minutes(condition: &StationCondition, now: DateTime<Utc>) -> u64 {
    let minutes = (now - condition.observation_time).num_minutes();
    u64::try_from(minutes).unwrap_or(0)
}

/// Returns `true` if the observation is older than `max_age_minutes`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
pub fn is_stale_at(condition: &StationCondition, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    observation_age_minutes(condition, now) > max_age_minutes
}

/// Convenience wrapper that uses the real current time.
pub fn is_stale(condition: &StationCondition, max_age_minutes: u64) -> bool {
    is_stale_at(condition, max_age_minutes, Utc::now())
}

/// Station ids whose observations are stale, sorted.
pub fn stale_stations(conditions: &ConditionMap, max_age_minutes: u64, now: DateTime<Utc>) -> Vec<String> {
    let mut stale: Vec<String> = conditions
        .values()
        .filter(|c| is_stale_at(c, max_age_minutes, now))
        .map(|c| c.station_id.clone())
        .collect();
    stale.sort();
    stale
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::config::WindSettings;
    use crate::model::RawStationRecord;
    use chrono::{Duration, TimeZone};

    /// A fixed "now" used across all tests: 2024-05-01 13:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn observed_minutes_ago(id: &str, minutes: i64) -> StationCondition {
        let mut record = RawStationRecord::new(id);
        record.observation_time = Some(fixed_now() - Duration::minutes(minutes));
        let wind = WindSettings {
            animate: true,
            blink_threshold_kt: 25,
            always_blink_for_gusts: false,
        };
        classify(&record, &wind, fixed_now())
    }

    // --- Not stale ----------------------------------------------------------

    #[test]
    fn test_recent_observation_is_not_stale() {
        let c = observed_minutes_ago("KBOS", 5);
        assert!(!is_stale_at(&c, 90, fixed_now()));
        assert_eq!(observation_age_minutes(&c, fixed_now()), 5);
    }

    #[test]
    fn test_observation_exactly_at_threshold_is_not_stale() {
        let c = observed_minutes_ago("KBOS", 90);
        assert!(
            !is_stale_at(&c, 90, fixed_now()),
            "staleness is strictly greater than, not >="
        );
    }

    #[test]
    fn test_future_observation_counts_as_fresh() {
        let c = observed_minutes_ago("KBOS", -10);
        assert_eq!(observation_age_minutes(&c, fixed_now()), 0);
        assert!(!is_stale_at(&c, 0, fixed_now()));
    }

    // --- Stale --------------------------------------------------------------

    #[test]
    fn test_observation_one_minute_past_threshold_is_stale() {
        let c = observed_minutes_ago("KBOS", 91);
        assert!(is_stale_at(&c, 90, fixed_now()));
    }

    #[test]
    fn test_same_observation_stale_under_tight_threshold_not_under_loose() {
        let c = observed_minutes_ago("KBOS", 120);
        assert!(is_stale_at(&c, 60, fixed_now()));
        assert!(!is_stale_at(&c, 180, fixed_now()));
    }

    #[test]
    fn test_stale_stations_lists_only_old_reports() {
        let mut map = ConditionMap::new();
        for c in [
            observed_minutes_ago("KJFK", 300),
            observed_minutes_ago("KBOS", 10),
            observed_minutes_ago("KALB", 200),
        ] {
            map.insert(c.station_id.clone(), c);
        }
        assert_eq!(stale_stations(&map, 90, fixed_now()), vec!["KALB", "KJFK"]);
    }
}
