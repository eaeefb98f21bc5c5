//! Target state calculation.
//!
//! Maps the position list and this cycle's conditions onto one
//! `(color, animate)` target per light. Pure: the same inputs always yield
//! the same output, and the output always has one entry per position.
//!
//! Color priority, first match wins:
//!   1. placeholder             → off
//!   2. station did not report  → off
//!   3. lightning               → lightning color
//!   4. VFR / MVFR / IFR / LIFR → category color
//!   5. unknown category        → off
//!
//! Animation follows the station's wind flag, gated by the global switch,
//! and is independent of which color branch was taken.

use crate::config::ColorTable;
use crate::logging::{self, Component};
use crate::model::{ConditionMap, Position, Target};

/// Computes the target for a single position.
pub fn target_for(
    position: &Position,
    conditions: &ConditionMap,
    colors: &ColorTable,
    wind_animation: bool,
) -> Target {
    let Some(station_id) = position.station_id() else {
        return Target::off(colors.off);
    };
    let Some(condition) = conditions.get(station_id) else {
        return Target::off(colors.off);
    };

    let color = if condition.lightning_present {
        colors.lightning
    } else {
        colors.for_category(condition.flight_category)
    };

    Target {
        color,
        animate: wind_animation && condition.wind_blink_eligible,
    }
}

/// Computes targets for every position, in position order.
pub fn calc_targets(
    positions: &[Position],
    conditions: &ConditionMap,
    colors: &ColorTable,
    wind_animation: bool,
) -> Vec<Target> {
    positions
        .iter()
        .enumerate()
        .map(|(index, position)| {
            let target = target_for(position, conditions, colors, wind_animation);
            if let Some(id) = position.station_id() {
                logging::debug(
                    Component::Leds,
                    Some(id),
                    &format!(
                        "position {} -> {}{}",
                        index,
                        target.color,
                        if target.animate { " windy" } else { "" }
                    ),
                );
            }
            target
        })
        .collect()
}

/// An all-off layout of `len` positions.
pub fn all_off(len: usize, colors: &ColorTable) -> Vec<Target> {
    vec![Target::off(colors.off); len]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
