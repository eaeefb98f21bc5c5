//! Refresh loop.
//!
//! One cycle: stop every blink task, fetch the latest reports, classify
//! them, compute the target state, then animate and rotate for one refresh
//! period. Repeats forever.
//!
//! When the fetch fails the configured stale policy decides what the
//! lights show until the next attempt:
//!   keep_last  → replay the previous cycle's targets, banner on the display
//!   blank      → every position off
//! With nothing to replay yet (first cycle) the loop waits the retry
//! backoff and tries again without touching the lights.

use std::thread;
use std::time::Instant;

use chrono::{Local, Utc};

use crate::classify;
use crate::config::{Config, StalePolicy};
use crate::dimming;
use crate::display::DisplaySink;
use crate::ingest::WeatherSource;
use crate::logging::{self, Component};
use crate::model::{ConditionMap, FlightCategory, MetarError, Target};
use crate::rotation::{self, CyclePlan};
use crate::scheduler::Scheduler;
use crate::staleness;
use crate::stations;
use crate::strip::LedSink;
use crate::targets;

pub const STALE_BANNER: &str = "WX DATA STALE";

/// What one cycle showed.
#[derive(Debug, Clone)]
pub struct CycleState {
    pub conditions: ConditionMap,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fresh data applied.
    Fresh { reporting: usize, unknown_category: usize },
    /// Fetch failed; the previous cycle's state was replayed.
    Stale,
    /// Fetch failed; every position turned off.
    Blanked,
    /// Fetch failed with nothing to replay; waited the retry backoff.
    Retried,
}

pub struct RefreshLoop<W: WeatherSource, S: LedSink, D: DisplaySink> {
    config: Config,
    source: W,
    scheduler: Scheduler<S>,
    display: Option<D>,
    last: Option<CycleState>,
}

impl<W: WeatherSource, S: LedSink, D: DisplaySink> RefreshLoop<W, S, D> {
    pub fn new(config: Config, source: W, scheduler: Scheduler<S>, display: Option<D>) -> Self {
        RefreshLoop {
            config,
            source,
            scheduler,
            display,
            last: None,
        }
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.scheduler
    }

    pub fn display(&self) -> Option<&D> {
        self.display.as_ref()
    }

    /// State applied by the last successful fetch.
    pub fn last_state(&self) -> Option<&CycleState> {
        self.last.as_ref()
    }

    pub fn run_forever(&mut self) -> ! {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            let outcome = self.run_cycle();
            logging::debug(Component::System, None, &format!("cycle {} finished: {:?}", cycle, outcome));
        }
    }

    /// Runs one full cycle, including its refresh-period wait.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if let Err(e) = self.scheduler.stop_all() {
            logging::error(Component::Scheduler, None, &format!("blink tasks left over from last cycle: {}", e));
        }

        let ids = stations::request_ids(&self.config.positions);
        let fetched = self.source.fetch(&ids);

        match fetched {
            Ok(records) => {
                let now = Utc::now();
                let conditions = classify::build_condition_map(&records, &self.config.wind, now);

                let reporting = ids.iter().filter(|id| conditions.contains_key(**id)).count();
                let unknown_category = conditions
                    .values()
                    .filter(|c| c.flight_category == FlightCategory::Unknown)
                    .count();
                logging::log_refresh_summary(ids.len(), reporting, unknown_category);

                let stale = staleness::stale_stations(
                    &conditions,
                    self.config.refresh.stale_observation_minutes,
                    now,
                );
                if !stale.is_empty() {
                    logging::warn(
                        Component::Awc,
                        None,
                        &format!(
                            "observations older than {} minutes: {}",
                            self.config.refresh.stale_observation_minutes,
                            stale.join(",")
                        ),
                    );
                }

                let targets = targets::calc_targets(
                    &self.config.positions,
                    &conditions,
                    &self.config.colors,
                    self.config.wind.animate,
                );
                let state = CycleState { conditions, targets };
                self.animate(&state, None);
                self.last = Some(state);

                CycleOutcome::Fresh { reporting, unknown_category }
            }
            Err(e) => {
                logging::log_fetch_failure(&ids, &e);
                self.on_fetch_failure()
            }
        }
    }

    fn on_fetch_failure(&mut self) -> CycleOutcome {
        match (self.config.refresh.stale_policy, self.last.clone()) {
            (StalePolicy::KeepLast, Some(state)) => {
                logging::warn(Component::System, None, "showing previous weather until the next refresh");
                self.animate(&state, Some(STALE_BANNER));
                CycleOutcome::Stale
            }
            (StalePolicy::KeepLast, None) => {
                let backoff = self.config.refresh.retry_backoff;
                logging::warn(
                    Component::System,
                    None,
                    &format!("no weather to show yet, retrying in {:?}", backoff),
                );
                thread::sleep(backoff);
                CycleOutcome::Retried
            }
            (StalePolicy::Blank, _) => {
                logging::warn(Component::System, None, "blanking the map until the next refresh");
                let state = CycleState {
                    conditions: ConditionMap::new(),
                    targets: targets::all_off(self.config.positions.len(), &self.config.colors),
                };
                self.animate(&state, None);
                CycleOutcome::Blanked
            }
        }
    }

    /// Applies `state` and keeps it on the lights for one refresh period.
    /// Wind blinks run for the whole period; no blink task survives this
    /// call.
    fn animate(&mut self, state: &CycleState, banner: Option<&str>) {
        let started = Instant::now();

        if let Err(e) = self.animate_and_rotate(state, banner) {
            logging::error(Component::Scheduler, None, &format!("animation step aborted: {}", e));
        }

        // Rotation finishes early when positions are skipped or no pass fits.
        if let Some(rest) = self.config.refresh.period.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }

        logging::info(Component::Scheduler, None, "stopping blink tasks before refresh");
        if let Err(e) = self.scheduler.stop_all() {
            logging::error(Component::Scheduler, None, &format!("could not stop blink tasks: {}", e));
        }
    }

    fn animate_and_rotate(&mut self, state: &CycleState, banner: Option<&str>) -> Result<(), MetarError> {
        let brightness = dimming::brightness_at(&Local::now(), &self.config.dimming);
        self.scheduler.strip().set_brightness(brightness);
        self.scheduler.apply(&state.targets)?;

        match self.display.as_mut() {
            Some(display) if self.config.rotation.enabled => {
                let plan = CyclePlan {
                    positions: &self.config.positions,
                    conditions: &state.conditions,
                    targets: &state.targets,
                    banner,
                };
                rotation::run_rotation(
                    &mut self.scheduler,
                    display,
                    plan,
                    &self.config.rotation,
                    self.config.refresh.period,
                    self.config.refresh.stale_observation_minutes,
                )
            }
            // Lights only: the caller holds them for the refresh period.
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
