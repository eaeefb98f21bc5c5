//! Textual display sink.
//!
//! The rotation shows one station at a time on a small text display.
//! `DisplaySink` is the boundary to that display's driver; `ConsoleDisplay`
//! renders the same text to stdout.

use crate::model::StationCondition;
use crate::staleness;

pub trait DisplaySink {
    /// Shows one station's condition. `stale` marks an old observation.
    fn render(&mut self, station_id: &str, condition: &StationCondition, stale: bool);

    fn clear(&mut self);

    /// Shows a one-line notice, e.g. that the weather data could not be
    /// refreshed. Displays without room for it may ignore it.
    fn banner(&mut self, _text: &str) {}
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Lines to show for a station, top to bottom:
///
/// ```text
/// KBOS VFR 1452Z
/// 270@30G35KT
/// 10SM -RA
/// 12/8C A29.92
/// FEW050 BKN120
/// ```
pub fn format_condition(station_id: &str, c: &StationCondition, stale: bool) -> Vec<String> {
    let mut header = format!(
        "{} {} {}",
        station_id,
        c.flight_category,
        c.observation_time.format("%H%MZ")
    );
    if stale {
        header.push_str(" OLD");
    }

    let mut wind = if c.wind_speed_kt == 0 && !c.wind_gusting {
        "CALM".to_string()
    } else {
        format!("{}@{}", c.wind_dir, c.wind_speed_kt)
    };
    if c.wind_gusting {
        wind.push_str(&format!("G{}", c.wind_gust_kt));
    }
    if wind != "CALM" {
        wind.push_str("KT");
    }
    if c.lightning_present {
        wind.push_str(" LTG");
    }

    let visibility = if c.wx_string.is_empty() {
        format!("{}SM", c.visibility_mi)
    } else {
        format!("{}SM {}", c.visibility_mi, c.wx_string)
    };

    let mut lines = vec![
        header,
        wind,
        visibility,
        format!("{}/{}C A{:.2}", c.temp_c, c.dewpoint_c, c.altimeter_in_hg),
    ];

    if !c.sky_conditions.is_empty() {
        let layers: Vec<String> = c
            .sky_conditions
            .iter()
            .map(|layer| {
                if layer.base_ft_agl == 0 {
                    layer.cover.clone()
                } else {
                    format!("{}{:03}", layer.cover, layer.base_ft_agl / 100)
                }
            })
            .collect();
        lines.push(layers.join(" "));
    }

    lines
}

// ---------------------------------------------------------------------------
// Console display
// ---------------------------------------------------------------------------

/// Prints each rendered station to stdout.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl ConsoleDisplay {
    pub fn new() -> Self {
        ConsoleDisplay
    }
}

impl DisplaySink for ConsoleDisplay {
    fn render(&mut self, station_id: &str, condition: &StationCondition, stale: bool) {
        println!("+--------------------------+");
        for line in format_condition(station_id, condition, stale) {
            println!("| {:<24} |", line);
        }
        println!("+--------------------------+");
    }

    fn clear(&mut self) {
        println!();
    }

    fn banner(&mut self, text: &str) {
        println!("*** {} ***", text);
    }
}

// ---------------------------------------------------------------------------
// Recording display
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Rendered { station_id: String, stale: bool },
    Cleared,
    Banner(String),
}

/// Records every call. Used as the test double for the display driver.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub events: Vec<DisplayEvent>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Station ids in the order they were rendered.
    pub fn rendered(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DisplayEvent::Rendered { station_id, .. } => Some(station_id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn banners(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DisplayEvent::Banner(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl DisplaySink for RecordingDisplay {
    fn render(&mut self, station_id: &str, _condition: &StationCondition, stale: bool) {
        self.events.push(DisplayEvent::Rendered {
            station_id: station_id.to_string(),
            stale,
        });
    }

    fn clear(&mut self) {
        self.events.push(DisplayEvent::Cleared);
    }

    fn banner(&mut self, text: &str) {
        self.events.push(DisplayEvent::Banner(text.to_string()));
    }
}

/// Renders `condition` with staleness judged against the current time.
pub fn render_with_age<D: DisplaySink>(display: &mut D, condition: &StationCondition, max_age_minutes: u64) {
    let stale = staleness::is_stale(condition, max_age_minutes);
    display.render(&condition.station_id, condition, stale);
}
