//! Blink task scheduler.
//!
//! Owns one background thread per animated position. Each thread alternates
//! its position between an off-phase color and its on color every half blink
//! period until it is told to stop.
//!
//! # Cancellation
//! Every task gets its own stop channel; there is no shared stop flag, so
//! stopping one position can never affect another. The task sleeps with
//! `recv_timeout` on that channel, so a stop request wakes it immediately
//! instead of waiting out the half period. A task stopped during its off
//! phase repaints its on color before it exits; a stopped position therefore
//! always shows its defined color.
//!
//! `stop` does not return until the thread has exited, so once it returns no
//! stale write for that position can land after a caller's own write.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::BlinkSettings;
use crate::logging::{self, Component};
use crate::model::{Color, MetarError, Target};
use crate::strip::{LedSink, SharedStrip};

// ---------------------------------------------------------------------------
// Blink tasks
// ---------------------------------------------------------------------------

struct BlinkTask {
    stop: Sender<()>,
    // Never sent on; disconnects when the task's closure is dropped,
    // which happens on normal exit and on unwind alike.
    exited: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Sleeps for `wait` unless a stop request arrives first. A dropped sender
/// counts as a stop request.
fn stop_requested_within(stop: &Receiver<()>, wait: Duration) -> bool {
    match stop.recv_timeout(wait) {
        Err(RecvTimeoutError::Timeout) => false,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
    }
}

fn run_blink<S: LedSink>(
    strip: SharedStrip<S>,
    position: usize,
    on: Color,
    off_phase: Color,
    half_period: Duration,
    stop: Receiver<()>,
) {
    loop {
        if strip.paint(position, off_phase).is_err() {
            return;
        }
        if stop_requested_within(&stop, half_period) {
            if let Err(e) = strip.paint(position, on) {
                logging::warn(
                    Component::Scheduler,
                    None,
                    &format!("could not restore color of position {} on stop: {}", position, e),
                );
            }
            return;
        }
        if strip.paint(position, on).is_err() {
            return;
        }
        if stop_requested_within(&stop, half_period) {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler<S: LedSink> {
    strip: SharedStrip<S>,
    blink: BlinkSettings,
    off_color: Color,
    tasks: BTreeMap<usize, BlinkTask>,
}

impl<S: LedSink> Scheduler<S> {
    pub fn new(strip: SharedStrip<S>, blink: BlinkSettings, off_color: Color) -> Self {
        Scheduler {
            strip,
            blink,
            off_color,
            tasks: BTreeMap::new(),
        }
    }

    pub fn strip(&self) -> &SharedStrip<S> {
        &self.strip
    }

    /// Positions that currently have a live blink task, ascending.
    pub fn live_positions(&self) -> Vec<usize> {
        self.tasks.keys().copied().collect()
    }

    pub fn is_live(&self, position: usize) -> bool {
        self.tasks.contains_key(&position)
    }

    /// Color shown during the off half of a blink.
    pub fn off_phase_color(&self, on: Color) -> Color {
        if self.blink.fade_instead_of_blink {
            on.scaled(self.blink.fade_factor)
        } else {
            self.off_color
        }
    }

    /// Paints every target's color in one frame, then starts a blink task
    /// for each animated target.
    ///
    /// Fails with `TasksStillLive` if any task from a previous layout is
    /// still running; callers must `stop_all` first.
    pub fn apply(&mut self, targets: &[Target]) -> Result<(), MetarError> {
        if !self.tasks.is_empty() {
            return Err(MetarError::TasksStillLive(self.tasks.len()));
        }

        let colors: Vec<Color> = targets.iter().map(|t| t.color).collect();
        self.strip.paint_all(&colors)?;

        for (position, target) in targets.iter().enumerate() {
            if target.animate {
                logging::debug(
                    Component::Scheduler,
                    None,
                    &format!("blinking position {}", position),
                );
                self.start(position, target.color)?;
            }
        }
        Ok(())
    }

    /// Starts a blink task on `position`. The position must not already be
    /// owned by a live task.
    pub fn start(&mut self, position: usize, color: Color) -> Result<(), MetarError> {
        self.strip.check_position(position)?;
        if self.tasks.contains_key(&position) {
            return Err(MetarError::PositionBusy(position));
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (exited_tx, exited_rx) = mpsc::channel::<()>();
        let strip = self.strip.clone();
        let off_phase = self.off_phase_color(color);
        let half_period = self.blink.half_period();

        let handle = thread::Builder::new()
            .name(format!("blink-{}", position))
            .spawn(move || {
                let _exited = exited_tx;
                run_blink(strip, position, color, off_phase, half_period, stop_rx);
            })
            .map_err(|e| MetarError::TaskSpawn(e.to_string()))?;

        self.tasks.insert(
            position,
            BlinkTask {
                stop: stop_tx,
                exited: exited_rx,
                handle,
            },
        );
        Ok(())
    }

    /// Stops the task on `position` and waits for it to exit.
    ///
    /// Returns `Ok(false)` if no task was running there. If the task does not
    /// exit within the join timeout the position stays owned and
    /// `JoinTimeout` is returned, so nothing else can start writing to it.
    pub fn stop(&mut self, position: usize) -> Result<bool, MetarError> {
        let Some(task) = self.tasks.remove(&position) else {
            return Ok(false);
        };

        // A send error means the task already exited on its own.
        let _ = task.stop.send(());

        match task.exited.recv_timeout(self.blink.join_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                logging::error(
                    Component::Scheduler,
                    None,
                    &format!(
                        "blink task for position {} still running after {:?}",
                        position, self.blink.join_timeout
                    ),
                );
                self.tasks.insert(position, task);
                Err(MetarError::JoinTimeout(position))
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match task.handle.join() {
                Ok(()) => Ok(true),
                Err(_) => Err(MetarError::TaskPanicked(position)),
            },
        }
    }

    /// Stops every live task. All tasks are attempted; the first failure is
    /// returned.
    pub fn stop_all(&mut self) -> Result<(), MetarError> {
        let mut first_error = None;
        for position in self.live_positions() {
            if let Err(e) = self.stop(position) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Blinks `position` on the calling thread for `duration`, one full
    /// off/on cycle every `period`, ending on `color`. The position must not
    /// be owned by a live task.
    pub fn fast_blink(
        &self,
        position: usize,
        color: Color,
        duration: Duration,
        period: Duration,
    ) -> Result<(), MetarError> {
        self.strip.check_position(position)?;
        if self.tasks.contains_key(&position) {
            return Err(MetarError::PositionBusy(position));
        }

        let cycles = if period.is_zero() {
            0
        } else {
            duration.as_nanos() / period.as_nanos()
        };
        let half = period / 2;
        for _ in 0..cycles {
            self.strip.paint(position, self.off_color)?;
            thread::sleep(half);
            self.strip.paint(position, color)?;
            thread::sleep(half);
        }
        if cycles == 0 {
            self.strip.paint(position, color)?;
            thread::sleep(duration);
        }
        Ok(())
    }

    /// Writes a static color to a position not owned by a live task.
    pub fn paint(&self, position: usize, color: Color) -> Result<(), MetarError> {
        if self.tasks.contains_key(&position) {
            return Err(MetarError::PositionBusy(position));
        }
        self.strip.paint(position, color)
    }
}

impl<S: LedSink> Drop for Scheduler<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop_all() {
            logging::error(Component::Scheduler, None, &format!("shutdown: {}", e));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
