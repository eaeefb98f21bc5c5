//! Indicator strip sink.
//!
//! `LedSink` is the boundary to the physical strip driver: buffered writes
//! plus an explicit flush. `SharedStrip` puts a sink behind a mutex so the
//! control thread and every blink thread can write to it; a write and its
//! flush always happen under one lock acquisition, so no other writer can
//! slip a frame in between.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::logging::{self, Component};
use crate::model::{Color, MetarError};

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// A hardware driver (e.g. a WS2812 strip on SPI or PWM) implements this
/// trait and is handed to `SharedStrip::new` in `main` in place of
/// `LogStrip`. Everything above the sink is driver-agnostic.
pub trait LedSink: Send + 'static {
    /// Number of addressable positions.
    fn len(&self) -> usize;

    /// Buffers a color for one position. Not visible until `flush`.
    fn set(&mut self, index: usize, color: Color);

    /// Pushes the buffered frame to the lights.
    fn flush(&mut self);

    /// Global brightness, 0.0 to 1.0. Applied by the driver on the next flush.
    fn set_brightness(&mut self, _brightness: f32) {}
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe handle to a sink.
pub struct SharedStrip<S: LedSink> {
    inner: Arc<Mutex<S>>,
    len: usize,
}

impl<S: LedSink> Clone for SharedStrip<S> {
    fn clone(&self) -> Self {
        SharedStrip {
            inner: Arc::clone(&self.inner),
            len: self.len,
        }
    }
}

impl<S: LedSink> SharedStrip<S> {
    pub fn new(sink: S) -> Self {
        let len = sink.len();
        SharedStrip {
            inner: Arc::new(Mutex::new(sink)),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn check_position(&self, position: usize) -> Result<(), MetarError> {
        if position >= self.len {
            return Err(MetarError::PositionOutOfRange { position, len: self.len });
        }
        Ok(())
    }

    // A panic in another writer leaves at worst a half-written frame buffer,
    // which the next write overwrites, so poisoning is not propagated.
    fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes one position and flushes, as a single unit.
    pub fn paint(&self, position: usize, color: Color) -> Result<(), MetarError> {
        self.check_position(position)?;
        let mut sink = self.lock();
        sink.set(position, color);
        sink.flush();
        Ok(())
    }

    /// Writes positions `0..colors.len()` and flushes once.
    pub fn paint_all(&self, colors: &[Color]) -> Result<(), MetarError> {
        if colors.len() > self.len {
            return Err(MetarError::PositionOutOfRange {
                position: colors.len() - 1,
                len: self.len,
            });
        }
        let mut sink = self.lock();
        for (index, color) in colors.iter().enumerate() {
            sink.set(index, *color);
        }
        sink.flush();
        Ok(())
    }

    pub fn set_brightness(&self, brightness: f32) {
        self.lock().set_brightness(brightness);
    }

    /// Runs `f` with exclusive access to the sink.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut sink = self.lock();
        f(&mut *sink)
    }
}

// ---------------------------------------------------------------------------
// Recording sink
// ---------------------------------------------------------------------------

/// One call observed by a `MemoryStrip`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StripEvent {
    Set { index: usize, color: Color },
    Flush,
    Brightness(f32),
}

/// In-memory sink that records every call. Used as the test double for the
/// strip driver.
#[derive(Debug, Clone)]
pub struct MemoryStrip {
    buffer: Vec<Color>,
    shown: Vec<Color>,
    brightness: f32,
    events: Vec<StripEvent>,
}

impl MemoryStrip {
    pub fn new(len: usize) -> Self {
        MemoryStrip {
            buffer: vec![Color::OFF; len],
            shown: vec![Color::OFF; len],
            brightness: 1.0,
            events: Vec::new(),
        }
    }

    /// The last flushed frame.
    pub fn shown(&self) -> &[Color] {
        &self.shown
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn events(&self) -> &[StripEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Number of recorded writes to `index`.
    pub fn writes_to(&self, index: usize) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, StripEvent::Set { index: i, .. } if *i == index))
            .count()
    }

    /// Colors written to `index`, in order.
    pub fn history_of(&self, index: usize) -> Vec<Color> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StripEvent::Set { index: i, color } if *i == index => Some(*color),
                _ => None,
            })
            .collect()
    }
}

impl LedSink for MemoryStrip {
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn set(&mut self, index: usize, color: Color) {
        self.buffer[index] = color;
        self.events.push(StripEvent::Set { index, color });
    }

    fn flush(&mut self) {
        self.shown.copy_from_slice(&self.buffer);
        self.events.push(StripEvent::Flush);
    }

    fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness;
        self.events.push(StripEvent::Brightness(brightness));
    }
}

// ---------------------------------------------------------------------------
// Logging sink
// ---------------------------------------------------------------------------

/// Sink that keeps the current frame and logs every changed position at
/// debug level on flush. Stands in for the hardware driver when running
/// without a strip attached.
#[derive(Debug)]
pub struct LogStrip {
    buffer: Vec<Color>,
    shown: Vec<Color>,
}

impl LogStrip {
    pub fn new(len: usize) -> Self {
        LogStrip {
            buffer: vec![Color::OFF; len],
            shown: vec![Color::OFF; len],
        }
    }
}

impl LedSink for LogStrip {
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn set(&mut self, index: usize, color: Color) {
        self.buffer[index] = color;
    }

    fn flush(&mut self) {
        for (index, (new, old)) in self.buffer.iter().zip(self.shown.iter()).enumerate() {
            if new != old {
                logging::debug(Component::Leds, None, &format!("pixel {} -> {}", index, new));
            }
        }
        self.shown.copy_from_slice(&self.buffer);
    }

    fn set_brightness(&mut self, brightness: f32) {
        logging::info(Component::Leds, None, &format!("brightness set to {:.2}", brightness));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
