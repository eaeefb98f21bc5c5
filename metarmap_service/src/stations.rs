//! Station position list.
//!
//! The ordered list of positions is the single source of truth for which
//! light belongs to which airport. Its order must match the wiring order of
//! the strip; every entry, placeholders included, occupies exactly one light.
//!
//! Lists come either from `stations.positions` in the TOML config or from a
//! legacy airports file with one identifier per line, where `NULL` or an
//! empty line marks an unused light.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::model::Position;

/// Marker used in station lists for a wired light with no airport behind it.
pub const PLACEHOLDER_MARKER: &str = "NULL";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Interprets one list entry. Identifiers are trimmed and upper-cased.
pub fn parse_position(entry: &str) -> Position {
    let id = entry.trim();
    if id.is_empty() || id.eq_ignore_ascii_case(PLACEHOLDER_MARKER) {
        Position::Placeholder
    } else {
        Position::Station(id.to_ascii_uppercase())
    }
}

/// Parses an airports file. Lines starting with `#` are comments and do not
/// occupy a position; every other line, blank ones included, does.
pub fn parse_airports_file(content: &str) -> Vec<Position> {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .map(parse_position)
        .collect()
}

/// Reads and parses an airports file from disk.
pub fn load_airports_file<P: AsRef<Path>>(path: P) -> Result<Vec<Position>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_airports_file(&content))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Station identifiers to request from the weather source, in position order,
/// with placeholders removed and duplicates collapsed.
pub fn request_ids(positions: &[Position]) -> Vec<&str> {
    let mut seen = HashSet::new();
    positions
        .iter()
        .filter_map(Position::station_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// ICAO location indicators are four letters or digits. Some feeds still
/// accept three-character FAA identifiers, so those pass too.
pub fn is_valid_station_id(id: &str) -> bool {
    (3..=4).contains(&id.len()) && id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Returns the entries whose identifiers do not look like station codes.
/// The weather API silently drops unknown identifiers, so these are worth
/// a warning at startup.
pub fn invalid_station_ids(positions: &[Position]) -> Vec<&str> {
    positions
        .iter()
        .filter_map(Position::station_id)
        .filter(|id| !is_valid_station_id(id))
        .collect()
}

/// Number of positions with a station behind them.
pub fn station_count(positions: &[Position]) -> usize {
    positions.iter().filter(|p| p.station_id().is_some()).count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str) -> Position {
        Position::Station(id.to_string())
    }

    #[test]
    fn test_null_and_blank_entries_are_placeholders() {
        assert_eq!(parse_position("NULL"), Position::Placeholder);
        assert_eq!(parse_position("null"), Position::Placeholder);
        assert_eq!(parse_position("   "), Position::Placeholder);
        assert_eq!(parse_position(""), Position::Placeholder);
    }

    #[test]
    fn test_station_ids_are_trimmed_and_uppercased() {
        assert_eq!(parse_position(" kbos\r"), station("KBOS"));
    }

    #[test]
    fn test_airports_file_keeps_one_position_per_line() {
        let content = "# east coast\nKBOS\nNULL\n\nkjfk\n";
        let positions = parse_airports_file(content);
        assert_eq!(
            positions,
            vec![station("KBOS"), Position::Placeholder, Position::Placeholder, station("KJFK")],
            "comment lines are skipped, blank lines stay as placeholders"
        );
    }

    #[test]
    fn test_request_ids_exclude_placeholders_and_duplicates() {
        let positions = vec![
            station("KBOS"),
            Position::Placeholder,
            station("KJFK"),
            station("KBOS"),
        ];
        assert_eq!(request_ids(&positions), vec!["KBOS", "KJFK"]);
    }

    #[test]
    fn test_all_placeholder_list_requests_nothing() {
        let positions = vec![Position::Placeholder; 4];
        assert!(request_ids(&positions).is_empty());
        assert_eq!(station_count(&positions), 0);
    }

    #[test]
    fn test_station_id_format() {
        assert!(is_valid_station_id("KBOS"));
        assert!(is_valid_station_id("K1B1"));
        assert!(is_valid_station_id("BOS"));
        assert!(!is_valid_station_id("KBOSX"));
        assert!(!is_valid_station_id("K-OS"));
        assert!(!is_valid_station_id("kbos"), "parse_position upper-cases; raw lowercase is rejected");
    }

    #[test]
    fn test_invalid_station_ids_are_reported() {
        let positions = vec![station("KBOS"), station("BOSTON"), Position::Placeholder];
        assert_eq!(invalid_station_ids(&positions), vec!["BOSTON"]);
    }

    #[test]
    fn test_sample_airports_file_loads() {
        let positions = load_airports_file("./airports").expect("sample airports file should load");
        assert!(station_count(&positions) > 0);
        assert!(invalid_station_ids(&positions).is_empty());
    }
}
