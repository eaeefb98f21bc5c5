//! Display rotation.
//!
//! Steps the display through every station in position order, a bounded
//! number of times per refresh cycle. With fast highlight on, the light of
//! the station being shown blinks rapidly while it is on screen. Its normal
//! wind blink task, if any, is stopped and joined first and restarted
//! afterwards, so the two never write to the same light at once.
//!
//! Blink tasks are left running when the rotation returns; the refresh loop
//! stops them once the whole refresh period has passed.

use std::thread;
use std::time::Duration;

use crate::config::RotationSettings;
use crate::display::{self, DisplaySink};
use crate::logging::{self, Component};
use crate::model::{ConditionMap, MetarError, Position, Target};
use crate::scheduler::Scheduler;
use crate::strip::LedSink;

/// Everything the rotation reads for one cycle. Immutable for its duration.
#[derive(Debug, Clone, Copy)]
pub struct CyclePlan<'a> {
    pub positions: &'a [Position],
    pub conditions: &'a ConditionMap,
    pub targets: &'a [Target],
    /// Notice shown once after the display is cleared, e.g. for stale data.
    pub banner: Option<&'a str>,
}

/// How many full passes fit into one refresh period:
/// `floor(refresh_period / (dwell × positions))`, zero if either is zero.
pub fn iteration_count(refresh_period: Duration, dwell: Duration, positions: usize) -> u32 {
    let pass = dwell.as_nanos() * positions as u128;
    if pass == 0 {
        return 0;
    }
    u32::try_from(refresh_period.as_nanos() / pass).unwrap_or(u32::MAX)
}

/// Runs one cycle's worth of rotation. Wind blink tasks are still running
/// when it returns.
///
/// Task-lifecycle errors abort the rotation and are returned.
pub fn run_rotation<S: LedSink, D: DisplaySink>(
    scheduler: &mut Scheduler<S>,
    display: &mut D,
    plan: CyclePlan<'_>,
    settings: &RotationSettings,
    refresh_period: Duration,
    stale_after_minutes: u64,
) -> Result<(), MetarError> {
    let iterations = iteration_count(refresh_period, settings.dwell, plan.positions.len());
    display.clear();
    if let Some(text) = plan.banner {
        display.banner(text);
    }

    for iteration in 0..iterations {
        logging::debug(
            Component::Rotation,
            None,
            &format!("starting loop {} of {}", iteration + 1, iterations),
        );
        rotate_once(scheduler, display, plan, settings, stale_after_minutes)?;
    }
    Ok(())
}

fn rotate_once<S: LedSink, D: DisplaySink>(
    scheduler: &mut Scheduler<S>,
    display: &mut D,
    plan: CyclePlan<'_>,
    settings: &RotationSettings,
    stale_after_minutes: u64,
) -> Result<(), MetarError> {
    for (index, position) in plan.positions.iter().enumerate() {
        let target = plan.targets.get(index).copied().ok_or(MetarError::PositionOutOfRange {
            position: index,
            len: plan.targets.len(),
        })?;

        let condition = position
            .station_id()
            .and_then(|id| plan.conditions.get(id));

        let Some(condition) = condition else {
            // Placeholder or no report: nothing to show, no dwell.
            continue;
        };

        let highlight = settings.fast_highlight;
        if highlight && target.animate {
            scheduler.stop(index)?;
        }

        logging::debug(
            Component::Display,
            Some(&condition.station_id),
            &format!("showing position {}", index),
        );
        display::render_with_age(display, condition, stale_after_minutes);

        if highlight {
            scheduler.fast_blink(index, target.color, settings.dwell, settings.fast_period)?;
            scheduler.paint(index, target.color)?;
            if target.animate {
                scheduler.start(index, target.color)?;
            }
        } else {
            thread::sleep(settings.dwell);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::config::{BlinkSettings, WindSettings};
    use crate::display::RecordingDisplay;
    use crate::model::{Color, RawStationRecord};
    use crate::strip::{MemoryStrip, SharedStrip};
    use chrono::Utc;

    const VFR: Color = Color(255, 0, 0);
    const IFR: Color = Color(0, 255, 0);

    fn blink() -> BlinkSettings {
        BlinkSettings {
            period: Duration::from_millis(20),
            fade_instead_of_blink: false,
            fade_factor: 0.5,
            join_timeout: Duration::from_secs(2),
        }
    }

    fn rotation(fast_highlight: bool) -> RotationSettings {
        RotationSettings {
            enabled: true,
            dwell: Duration::from_millis(10),
            fast_highlight,
            fast_period: Duration::from_millis(4),
        }
    }

    fn conditions() -> ConditionMap {
        let wind = WindSettings {
            animate: true,
            blink_threshold_kt: 25,
            always_blink_for_gusts: false,
        };
        ["KBOS", "KJFK"]
            .iter()
            .map(|id| {
                let mut r = RawStationRecord::new(id);
                r.flight_category = Some("VFR".into());
                r.observation_time = Some(Utc::now());
                (id.to_string(), classify(&r, &wind, Utc::now()))
            })
            .collect()
    }

    fn positions() -> Vec<Position> {
        vec![
            Position::Station("KBOS".into()),
            Position::Placeholder,
            Position::Station("KJFK".into()),
            Position::Station("KZZZ".into()),
        ]
    }

    fn targets() -> Vec<Target> {
        vec![
            Target { color: VFR, animate: true },
            Target::off(Color::OFF),
            Target { color: IFR, animate: false },
            Target::off(Color::OFF),
        ]
    }

    #[test]
    fn test_iteration_count_truncates() {
        let secs = Duration::from_secs;
        assert_eq!(iteration_count(secs(1800), secs(5), 50), 7);
        assert_eq!(iteration_count(secs(100), secs(5), 4), 5);
        assert_eq!(iteration_count(secs(19), secs(5), 4), 0);
        assert_eq!(iteration_count(secs(100), secs(5), 0), 0);
        assert_eq!(iteration_count(secs(100), Duration::ZERO, 4), 0);
    }

    #[test]
    fn test_rotation_renders_only_reporting_stations_in_order() {
        let mut sched = Scheduler::new(SharedStrip::new(MemoryStrip::new(4)), blink(), Color::OFF);
        let mut display = RecordingDisplay::new();
        let (positions, conditions, targets) = (positions(), conditions(), targets());
        let plan = CyclePlan { positions: &positions, conditions: &conditions, targets: &targets, banner: None };

        // 80ms / (10ms * 4 positions) = 2 passes
        run_rotation(&mut sched, &mut display, plan, &rotation(false), Duration::from_millis(80), 90)
            .unwrap();

        assert_eq!(display.rendered(), vec!["KBOS", "KJFK", "KBOS", "KJFK"]);
    }

    #[test]
    fn test_fast_highlight_restarts_wind_blink() {
        let mut sched = Scheduler::new(SharedStrip::new(MemoryStrip::new(4)), blink(), Color::OFF);
        let (positions, conditions, targets) = (positions(), conditions(), targets());
        sched.apply(&targets).unwrap();
        assert_eq!(sched.live_positions(), vec![0]);

        let mut display = RecordingDisplay::new();
        let plan = CyclePlan { positions: &positions, conditions: &conditions, targets: &targets, banner: None };
        run_rotation(&mut sched, &mut display, plan, &rotation(true), Duration::from_millis(40), 90)
            .unwrap();

        assert!(sched.is_live(0), "wind blink must be running again after the highlight");
        assert!(!sched.is_live(2), "calm station never gets a blink task");

        // The restarted task keeps writing at the normal blink rate.
        let writes_after_rotation = sched.strip().with(|s| s.writes_to(0));
        thread::sleep(Duration::from_millis(50));
        assert!(sched.strip().with(|s| s.writes_to(0)) > writes_after_rotation);

        sched.stop_all().unwrap();
        sched.strip().with(|s| {
            assert_eq!(s.shown(), &[VFR, Color::OFF, IFR, Color::OFF]);
            // Fast blink on the highlighted calm station wrote to its light.
            assert!(s.history_of(2).len() > 2);
            assert_eq!(s.writes_to(1), 1, "placeholder only gets the initial frame");
            assert_eq!(s.writes_to(3), 1, "no-data station only gets the initial frame");
        });
    }

    #[test]
    fn test_no_highlight_leaves_indicator_alone() {
        let mut sched = Scheduler::new(SharedStrip::new(MemoryStrip::new(4)), blink(), Color::OFF);
        let (positions, conditions, targets) = (positions(), conditions(), targets());
        let static_targets: Vec<Target> = targets.iter().map(|t| Target { animate: false, ..*t }).collect();
        sched.apply(&static_targets).unwrap();
        sched.strip().with(|s| s.clear_events());

        let mut display = RecordingDisplay::new();
        let plan = CyclePlan { positions: &positions, conditions: &conditions, targets: &static_targets, banner: None };
        run_rotation(&mut sched, &mut display, plan, &rotation(false), Duration::from_millis(40), 90)
            .unwrap();

        sched.strip().with(|s| assert!(s.events().is_empty()));
        assert_eq!(display.rendered().len(), 2);
    }

    #[test]
    fn test_rotation_with_short_targets_reports_error() {
        let mut sched = Scheduler::new(SharedStrip::new(MemoryStrip::new(4)), blink(), Color::OFF);
        let (positions, conditions) = (positions(), conditions());
        let targets = vec![Target { color: VFR, animate: true }];
        sched.apply(&targets).unwrap();

        let mut display = RecordingDisplay::new();
        let plan = CyclePlan { positions: &positions, conditions: &conditions, targets: &targets, banner: None };
        let result = run_rotation(&mut sched, &mut display, plan, &rotation(true), Duration::from_millis(40), 90);

        assert!(matches!(result, Err(MetarError::PositionOutOfRange { .. })));
        sched.stop_all().unwrap();
        assert!(sched.live_positions().is_empty());
    }

    #[test]
    fn test_zero_iterations_leaves_wind_blink_running() {
        let mut sched = Scheduler::new(SharedStrip::new(MemoryStrip::new(4)), blink(), Color::OFF);
        let (positions, conditions, targets) = (positions(), conditions(), targets());
        sched.apply(&targets).unwrap();

        let mut display = RecordingDisplay::new();
        let plan = CyclePlan { positions: &positions, conditions: &conditions, targets: &targets, banner: None };
        // 30ms < 10ms * 4 positions: no pass fits.
        run_rotation(&mut sched, &mut display, plan, &rotation(true), Duration::from_millis(30), 90)
            .unwrap();

        assert!(display.rendered().is_empty());
        assert_eq!(sched.live_positions(), vec![0]);
        sched.stop_all().unwrap();
    }
}
