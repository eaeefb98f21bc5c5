//! Condition classification.
//!
//! Turns raw station records into `StationCondition`s: defaults missing
//! numeric fields, rounds values to display precision, and derives the two
//! flags the indicator cares about, wind-blink eligibility and lightning.
//!
//! # Clock injection
//! `classify` takes `now` rather than calling `Utc::now()`; it is only used
//! when a record has no observation time.

use chrono::{DateTime, Utc};

use crate::config::WindSettings;
use crate::logging::{self, Component};
use crate::model::{ConditionMap, FlightCategory, RawStationRecord, StationCondition};

/// Token marking lightning in METAR remarks and weather strings.
pub const LIGHTNING_TOKEN: &str = "LTG";

// ---------------------------------------------------------------------------
// Derived flags
// ---------------------------------------------------------------------------

/// Returns `true` when wind at a station should animate its light.
///
/// Eligible when any of:
///   - gusts are reported and `always_blink_for_gusts` is set
///   - the gust speed is strictly above the threshold
///   - the sustained speed is strictly above the threshold
pub fn is_wind_blink_eligible(speed_kt: u32, gust_kt: Option<u32>, wind: &WindSettings) -> bool {
    let gust_trigger = match gust_kt {
        Some(gust) => wind.always_blink_for_gusts || gust > wind.blink_threshold_kt,
        None => false,
    };
    gust_trigger || speed_kt > wind.blink_threshold_kt
}

/// Returns `true` when the weather string or the raw report mentions lightning.
pub fn has_lightning(record: &RawStationRecord) -> bool {
    [&record.wx_string, &record.raw_text]
        .into_iter()
        .flatten()
        .any(|text| text.contains(LIGHTNING_TOKEN))
}

fn knots(value: Option<i64>) -> Option<u32> {
    value.map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
}

fn round_whole(value: Option<f64>) -> i32 {
    value.filter(|v| v.is_finite()).map(|v| v.round() as i32).unwrap_or(0)
}

fn round_hundredths(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).map(|v| (v * 100.0).round() / 100.0).unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies one record. Never fails: every missing field has a default,
/// and a record without a usable flight category becomes `Unknown`.
pub fn classify(record: &RawStationRecord, wind: &WindSettings, now: DateTime<Utc>) -> StationCondition {
    let flight_category = record
        .flight_category
        .as_deref()
        .map(FlightCategory::parse)
        .unwrap_or(FlightCategory::Unknown);

    if flight_category == FlightCategory::Unknown {
        logging::warn(
            Component::Awc,
            Some(&record.station_id),
            &format!(
                "missing or unrecognized flight category {:?}, showing as UNKNOWN",
                record.flight_category
            ),
        );
    }

    let wind_speed_kt = knots(record.wind_speed_kt).unwrap_or(0);
    let gust = knots(record.wind_gust_kt);

    StationCondition {
        station_id: record.station_id.clone(),
        flight_category,
        wind_dir: record.wind_dir.clone().unwrap_or_default(),
        wind_speed_kt,
        wind_gust_kt: gust.unwrap_or(0),
        wind_gusting: gust.is_some(),
        wind_blink_eligible: is_wind_blink_eligible(wind_speed_kt, gust, wind),
        lightning_present: has_lightning(record),
        temp_c: round_whole(record.temp_c),
        dewpoint_c: round_whole(record.dewpoint_c),
        visibility_mi: round_whole(record.visibility_mi),
        altimeter_in_hg: round_hundredths(record.altimeter_in_hg),
        wx_string: record.wx_string.clone().unwrap_or_default(),
        sky_conditions: record.sky_conditions.clone(),
        observation_time: record.observation_time.unwrap_or(now),
    }
}

/// One-line summary in the form `KBOS:VFR:270@30G35:10SM:-RA:12/8:29.92:LTG=false`.
pub fn summary_line(c: &StationCondition) -> String {
    let gust = if c.wind_gusting {
        format!("G{}", c.wind_gust_kt)
    } else {
        String::new()
    };
    format!(
        "{}:{}:{}@{}{}:{}SM:{}:{}/{}:{:.2}:LTG={}",
        c.station_id,
        c.flight_category,
        c.wind_dir,
        c.wind_speed_kt,
        gust,
        c.visibility_mi,
        c.wx_string,
        c.temp_c,
        c.dewpoint_c,
        c.altimeter_in_hg,
        c.lightning_present
    )
}

/// Classifies every record into a map keyed by station id.
///
/// If the feed repeats a station, the first record wins.
pub fn build_condition_map(
    records: &[RawStationRecord],
    wind: &WindSettings,
    now: DateTime<Utc>,
) -> ConditionMap {
    let mut conditions = ConditionMap::with_capacity(records.len());
    for record in records {
        if conditions.contains_key(&record.station_id) {
            logging::warn(
                Component::Awc,
                Some(&record.station_id),
                "duplicate report in feed, keeping the first",
            );
            continue;
        }
        let condition = classify(record, wind, now);
        logging::info(Component::Awc, Some(&record.station_id), &summary_line(&condition));
        conditions.insert(record.station_id.clone(), condition);
    }
    conditions
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SkyLayer;
    use chrono::TimeZone;

    fn wind(threshold: u32, always_for_gusts: bool) -> WindSettings {
        WindSettings {
            animate: true,
            blink_threshold_kt: threshold,
            always_blink_for_gusts: always_for_gusts,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    // --- Missing fields -----------------------------------------------------

    #[test]
    fn test_record_with_only_station_id_gets_defaults() {
        let c = classify(&RawStationRecord::new("KBOS"), &wind(25, false), fixed_now());

        assert_eq!(c.station_id, "KBOS");
        assert_eq!(c.flight_category, FlightCategory::Unknown);
        assert_eq!(c.wind_speed_kt, 0);
        assert_eq!(c.wind_gust_kt, 0);
        assert!(!c.wind_gusting);
        assert!(!c.wind_blink_eligible);
        assert!(!c.lightning_present);
        assert_eq!(c.temp_c, 0);
        assert_eq!(c.dewpoint_c, 0);
        assert_eq!(c.visibility_mi, 0);
        assert_eq!(c.altimeter_in_hg, 0.0);
        assert_eq!(c.wx_string, "");
        assert!(c.sky_conditions.is_empty());
        assert_eq!(c.observation_time, fixed_now(), "missing observation time defaults to now");
    }

    #[test]
    fn test_unrecognized_category_is_unknown_not_dropped() {
        let mut record = RawStationRecord::new("KXYZ");
        record.flight_category = Some("SVFR".into());
        let map = build_condition_map(&[record], &wind(25, false), fixed_now());
        assert_eq!(map["KXYZ"].flight_category, FlightCategory::Unknown);
    }

    // --- Rounding -----------------------------------------------------------

    #[test]
    fn test_numeric_fields_are_rounded_for_display() {
        let mut record = RawStationRecord::new("KBOS");
        record.temp_c = Some(12.6);
        record.dewpoint_c = Some(-3.4);
        record.visibility_mi = Some(2.5);
        record.altimeter_in_hg = Some(29.9213);
        let c = classify(&record, &wind(25, false), fixed_now());

        assert_eq!(c.temp_c, 13);
        assert_eq!(c.dewpoint_c, -3);
        assert_eq!(c.visibility_mi, 3);
        assert_eq!(c.altimeter_in_hg, 29.92);
    }

    #[test]
    fn test_negative_wind_values_clamp_to_zero() {
        let mut record = RawStationRecord::new("KBOS");
        record.wind_speed_kt = Some(-5);
        record.wind_gust_kt = Some(-1);
        let c = classify(&record, &wind(25, false), fixed_now());
        assert_eq!(c.wind_speed_kt, 0);
        assert_eq!(c.wind_gust_kt, 0);
        assert!(c.wind_gusting, "a reported gust is still a gust");
    }

    // --- Wind eligibility ---------------------------------------------------

    #[test]
    fn test_wind_blink_eligibility_truth_table() {
        let threshold = 25;
        // (speed, gust, always_for_gusts, expected)
        let cases: &[(u32, Option<u32>, bool, bool)] = &[
            (10, None, false, false),
            (10, None, true, false),
            (25, None, false, false), // equal is not above
            (26, None, false, true),
            (10, Some(20), false, false),
            (10, Some(20), true, true),
            (10, Some(25), false, false),
            (10, Some(26), false, true),
            (30, Some(20), false, true),
            (0, Some(0), true, true),
        ];
        for &(speed, gust, always, expected) in cases {
            assert_eq!(
                is_wind_blink_eligible(speed, gust, &wind(threshold, always)),
                expected,
                "speed={} gust={:?} always={}",
                speed,
                gust,
                always
            );
        }
    }

    #[test]
    fn test_classify_sets_wind_blink_from_record() {
        let mut record = RawStationRecord::new("KBOS");
        record.flight_category = Some("VFR".into());
        record.wind_speed_kt = Some(30);
        let c = classify(&record, &wind(25, false), fixed_now());
        assert!(c.wind_blink_eligible);
        assert_eq!(c.flight_category, FlightCategory::Vfr);
    }

    // --- Lightning ----------------------------------------------------------

    #[test]
    fn test_lightning_detected_in_raw_text() {
        let mut record = RawStationRecord::new("KJFK");
        record.raw_text = Some("KJFK 011251Z 21012KT 3SM TSRA BKN015CB RMK LTG DSNT W".into());
        assert!(has_lightning(&record));
    }

    #[test]
    fn test_lightning_detected_in_weather_string() {
        let mut record = RawStationRecord::new("KJFK");
        record.wx_string = Some("+TSRA LTGICCG".into());
        assert!(has_lightning(&record));
    }

    #[test]
    fn test_no_lightning_without_token() {
        let mut record = RawStationRecord::new("KJFK");
        record.raw_text = Some("KJFK 011251Z 21012KT 10SM FEW250 22/10 A2992".into());
        record.wx_string = Some("-RA".into());
        assert!(!has_lightning(&record));
    }

    // --- Map building -------------------------------------------------------

    #[test]
    fn test_duplicate_station_keeps_first_record() {
        let mut first = RawStationRecord::new("KBOS");
        first.flight_category = Some("IFR".into());
        let mut second = RawStationRecord::new("KBOS");
        second.flight_category = Some("VFR".into());

        let map = build_condition_map(&[first, second], &wind(25, false), fixed_now());
        assert_eq!(map.len(), 1);
        assert_eq!(map["KBOS"].flight_category, FlightCategory::Ifr);
    }

    #[test]
    fn test_summary_line_format() {
        let mut record = RawStationRecord::new("KBOS");
        record.flight_category = Some("VFR".into());
        record.wind_dir = Some("270".into());
        record.wind_speed_kt = Some(30);
        record.wind_gust_kt = Some(35);
        record.visibility_mi = Some(10.0);
        record.wx_string = Some("-RA".into());
        record.temp_c = Some(12.0);
        record.dewpoint_c = Some(8.0);
        record.altimeter_in_hg = Some(29.92);
        record.sky_conditions = vec![SkyLayer { cover: "BKN".into(), base_ft_agl: 3500 }];
        let c = classify(&record, &wind(25, false), fixed_now());

        assert_eq!(summary_line(&c), "KBOS:VFR:270@30G35:10SM:-RA:12/8:29.92:LTG=false");
    }
}
