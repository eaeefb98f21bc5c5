//! Daytime dimming.
//!
//! Chooses the strip brightness from the local time of day. Bright between
//! `bright_start` and `dim_start` (both exclusive), dim otherwise. A window
//! that crosses midnight (bright start later than dim start) is supported.
//!
//! With a sun location configured the window runs from that day's sunrise
//! to sunset instead, falling back to the fixed times on days the sun does
//! not rise or set there.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};

use crate::config::{DimmingSettings, GeoPoint};
use crate::logging::{self, Component};

/// Returns `true` when `now` falls inside the bright window.
pub fn is_bright_at(now: NaiveTime, bright_start: NaiveTime, dim_start: NaiveTime) -> bool {
    if bright_start <= dim_start {
        bright_start < now && now < dim_start
    } else {
        now > bright_start || now < dim_start
    }
}

/// Sunrise and sunset on `date` at `at`, or `None` during polar day or night.
pub fn sun_times(date: NaiveDate, at: GeoPoint) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let (rise, set) = sunrise::sunrise_sunset(at.latitude, at.longitude, date.year(), date.month(), date.day());
    let rise = DateTime::<Utc>::from_timestamp(rise, 0)?;
    let set = DateTime::<Utc>::from_timestamp(set, 0)?;
    (rise < set && set - rise < TimeDelta::days(1)).then_some((rise, set))
}

/// Bright window start and end, as local times in `now`'s time zone.
pub fn bright_window<Tz: TimeZone>(now: &DateTime<Tz>, settings: &DimmingSettings) -> (NaiveTime, NaiveTime) {
    let Some(at) = settings.sun_location else {
        return (settings.bright_start, settings.dim_start);
    };

    match sun_times(now.date_naive(), at) {
        Some((rise, set)) => {
            let tz = now.timezone();
            (rise.with_timezone(&tz).time(), set.with_timezone(&tz).time())
        }
        None => {
            logging::warn(
                Component::Leds,
                None,
                "no sunrise/sunset at the configured location today, using fixed dimming times",
            );
            (settings.bright_start, settings.dim_start)
        }
    }
}

/// Brightness to use at `now`. With dimming disabled this is always the
/// full configured brightness.
pub fn brightness_at<Tz: TimeZone>(now: &DateTime<Tz>, settings: &DimmingSettings) -> f32 {
    if !settings.enabled {
        return settings.brightness;
    }
    let (bright_start, dim_start) = bright_window(now, settings);
    if is_bright_at(now.time(), bright_start, dim_start) {
        settings.brightness
    } else {
        settings.dim_brightness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    const BOSTON: GeoPoint = GeoPoint { latitude: 42.3601, longitude: -71.0589 };

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn settings(enabled: bool) -> DimmingSettings {
        DimmingSettings {
            enabled,
            sun_location: None,
            bright_start: t(7, 0),
            dim_start: t(19, 0),
            brightness: 0.5,
            dim_brightness: 0.1,
        }
    }

    fn sun_settings() -> DimmingSettings {
        DimmingSettings {
            sun_location: Some(BOSTON),
            ..settings(true)
        }
    }

    /// Local time in Boston; `utc_offset_hours` is -4 in summer, -5 in winter.
    fn boston(utc_offset_hours: i32, y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(utc_offset_hours * 3600)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_bright_window_is_exclusive() {
        assert!(!is_bright_at(t(7, 0), t(7, 0), t(19, 0)));
        assert!(is_bright_at(t(7, 1), t(7, 0), t(19, 0)));
        assert!(is_bright_at(t(18, 59), t(7, 0), t(19, 0)));
        assert!(!is_bright_at(t(19, 0), t(7, 0), t(19, 0)));
        assert!(!is_bright_at(t(2, 0), t(7, 0), t(19, 0)));
    }

    #[test]
    fn test_window_crossing_midnight() {
        assert!(is_bright_at(t(23, 0), t(22, 0), t(6, 0)));
        assert!(is_bright_at(t(1, 0), t(22, 0), t(6, 0)));
        assert!(!is_bright_at(t(12, 0), t(22, 0), t(6, 0)));
    }

    #[test]
    fn test_brightness_follows_window() {
        assert_eq!(brightness_at(&boston(-4, 2024, 6, 21, 12, 0), &settings(true)), 0.5);
        assert_eq!(brightness_at(&boston(-4, 2024, 6, 21, 22, 0), &settings(true)), 0.1);
    }

    #[test]
    fn test_disabled_dimming_is_always_bright() {
        assert_eq!(brightness_at(&boston(-4, 2024, 6, 21, 22, 0), &settings(false)), 0.5);
        assert_eq!(brightness_at(&boston(-4, 2024, 6, 21, 22, 0), &DimmingSettings { enabled: false, ..sun_settings() }), 0.5);
    }

    #[test]
    fn test_summer_solstice_window_in_boston() {
        // Sunrise about 05:07 EDT, sunset about 20:25 EDT.
        let (rise, set) = bright_window(&boston(-4, 2024, 6, 21, 12, 0), &sun_settings());
        assert!(t(4, 55) < rise && rise < t(5, 20), "sunrise {}", rise);
        assert!(t(20, 10) < set && set < t(20, 40), "sunset {}", set);
    }

    #[test]
    fn test_sun_window_differs_from_fixed_times() {
        // 06:00 in June: sun is up, fixed window still dim.
        let june_dawn = boston(-4, 2024, 6, 21, 6, 0);
        assert_eq!(brightness_at(&june_dawn, &sun_settings()), 0.5);
        assert_eq!(brightness_at(&june_dawn, &settings(true)), 0.1);

        // 17:00 in December: sun set about 16:15 EST, fixed window still bright.
        let december_dusk = boston(-5, 2024, 12, 21, 17, 0);
        assert_eq!(brightness_at(&december_dusk, &sun_settings()), 0.1);
        assert_eq!(brightness_at(&december_dusk, &settings(true)), 0.5);
    }

    #[test]
    fn test_sun_times_are_ordered_for_mid_latitudes() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let (rise, set) = sun_times(date, BOSTON).expect("sun rises in Boston");
        let day = set - rise;
        assert!(day > TimeDelta::hours(11) && day < TimeDelta::hours(13), "equinox day length {}", day);
    }
}
