//! AviationWeather.gov (AWC) Data API Client
//!
//! Retrieves the latest METAR for each requested station from the NOAA
//! Aviation Weather Center data API and maps it onto `RawStationRecord`s.
//!
//! API Documentation: https://aviationweather.gov/data/api/
//! METAR endpoint:    https://aviationweather.gov/api/data/metar?ids=KBOS&format=json

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::FeedSettings;
use crate::ingest::WeatherSource;
use crate::logging::{self, Component};
use crate::model::{MetarError, RawStationRecord, SkyLayer};

const USER_AGENT: &str = concat!("metarmap_service/", env!("CARGO_PKG_VERSION"));

/// Hectopascals to inches of mercury.
const HPA_TO_IN_HG: f64 = 0.029_53;

// ============================================================================
// AWC API Response Structures
// ============================================================================

/// Fields that the API sends either as a number or as text
/// (`"wdir": "VRB"`, `"visib": "10+"`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Single METAR entry of the JSON response array
#[derive(Debug, Deserialize)]
pub struct AwcMetar {
    #[serde(rename = "icaoId")]
    pub icao_id: String,
    #[serde(rename = "obsTime")]
    pub obs_time: Option<i64>, // unix seconds
    pub temp: Option<f64>,     // °C
    pub dewp: Option<f64>,     // °C
    pub wdir: Option<NumberOrText>,
    pub wspd: Option<f64>, // knots
    pub wgst: Option<f64>, // knots
    pub visib: Option<NumberOrText>, // statute miles
    pub altim: Option<f64>, // hPa
    #[serde(rename = "wxString")]
    pub wx_string: Option<String>,
    #[serde(rename = "rawOb")]
    pub raw_ob: Option<String>,
    #[serde(rename = "fltCat")]
    pub flt_cat: Option<String>,
    pub clouds: Option<Vec<AwcCloud>>,
}

#[derive(Debug, Deserialize)]
pub struct AwcCloud {
    pub cover: String,
    pub base: Option<f64>, // feet AGL
}

// ============================================================================
// URL construction and parsing
// ============================================================================

/// Builds the METAR request URL for the given stations.
pub fn build_metar_url(base_url: &str, station_ids: &[&str], hours_before_now: u32) -> String {
    format!(
        "{}/api/data/metar?ids={}&format=json&hours={}",
        base_url.trim_end_matches('/'),
        station_ids.join(","),
        hours_before_now
    )
}

/// Parses visibility text such as `"10+"`, `"P6SM"`, `"1/2"`, or `"1 1/2"`.
pub fn parse_visibility(text: &str) -> Option<f64> {
    let cleaned = text
        .trim()
        .trim_end_matches("SM")
        .trim_end_matches('+')
        .trim_start_matches(['P', 'M']);

    let fraction = |s: &str| -> Option<f64> {
        match s.split_once('/') {
            Some((n, d)) => {
                let n: f64 = n.trim().parse().ok()?;
                let d: f64 = d.trim().parse().ok()?;
                (d != 0.0).then(|| n / d)
            }
            None => s.trim().parse().ok(),
        }
    };

    match cleaned.split_once(' ') {
        Some((whole, part)) => Some(whole.trim().parse::<f64>().ok()? + fraction(part)?),
        None => fraction(cleaned),
    }
}

fn wind_dir_text(wdir: &NumberOrText) -> String {
    match wdir {
        NumberOrText::Number(deg) => format!("{:03}", deg.round() as i64),
        NumberOrText::Text(text) => text.trim().to_string(),
    }
}

fn visibility_miles(visib: &NumberOrText) -> Option<f64> {
    match visib {
        NumberOrText::Number(v) => Some(*v),
        NumberOrText::Text(text) => parse_visibility(text),
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|s| !s.trim().is_empty())
}

/// Maps one API entry onto a raw record. Nothing is filtered here; fields
/// the API omitted stay `None`.
fn to_record(m: AwcMetar) -> RawStationRecord {
    let sky_conditions = m
        .clouds
        .unwrap_or_default()
        .into_iter()
        .map(|c| SkyLayer {
            cover: c.cover,
            base_ft_agl: c.base.map(|b| b.max(0.0).round() as u32).unwrap_or(0),
        })
        .collect();

    RawStationRecord {
        station_id: m.icao_id.trim().to_ascii_uppercase(),
        flight_category: non_empty(m.flt_cat),
        wind_dir: m.wdir.as_ref().map(wind_dir_text),
        wind_speed_kt: m.wspd.map(|v| v.round() as i64),
        wind_gust_kt: m.wgst.map(|v| v.round() as i64),
        temp_c: m.temp,
        dewpoint_c: m.dewp,
        visibility_mi: m.visib.as_ref().and_then(visibility_miles),
        altimeter_in_hg: m.altim.map(|hpa| hpa * HPA_TO_IN_HG),
        wx_string: non_empty(m.wx_string),
        raw_text: non_empty(m.raw_ob),
        sky_conditions,
        observation_time: m.obs_time.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
    }
}

/// Parses a METAR JSON response body.
///
/// The API lists the newest report first when a station has several in the
/// lookback window; only that one is kept. An empty body (HTTP 204) means
/// no station reported.
pub fn parse_metar_response(body: &str) -> Result<Vec<RawStationRecord>, MetarError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<AwcMetar> =
        serde_json::from_str(body).map_err(|e| MetarError::Parse(e.to_string()))?;

    let mut seen = HashSet::new();
    Ok(entries
        .into_iter()
        .map(to_record)
        .filter(|r| seen.insert(r.station_id.clone()))
        .collect())
}

// ============================================================================
// API Client
// ============================================================================

/// Blocking client for the AWC METAR endpoint.
pub struct AwcClient {
    client: reqwest::blocking::Client,
    base_url: String,
    hours_before_now: u32,
}

impl AwcClient {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(feed: &FeedSettings, timeout: Duration) -> Result<Self, MetarError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MetarError::Transport(e.to_string()))?;

        Ok(AwcClient {
            client,
            base_url: feed.base_url.clone(),
            hours_before_now: feed.hours_before_now,
        })
    }
}

impl WeatherSource for AwcClient {
    fn fetch(&self, station_ids: &[&str]) -> Result<Vec<RawStationRecord>, MetarError> {
        if station_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = build_metar_url(&self.base_url, station_ids, self.hours_before_now);
        logging::info(Component::Awc, None, &format!("Retrieving from {}", url));

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| MetarError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MetarError::Http(response.status().as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| MetarError::Transport(e.to_string()))?;

        parse_metar_response(&body)
    }
}

// ============================================================================
// Tests
// ============================================================================
