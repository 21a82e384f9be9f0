use std::time::{Duration, Instant};

use crate::config::GestureConfig;

/// Normalized navigation intent derived from raw input. Recognizers return
/// `Option<Intent>`; `None` is the "no navigation" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Advance,
    Retreat,
}

// Floor for Δtime in the instantaneous velocity estimate, so a burst of
// same-millisecond pointer samples cannot blow the division up.
const MIN_SAMPLE_DT_MS: f32 = 1.0;

const VIEWPORT_FRACTION: f32 = 0.25;

#[derive(Debug)]
struct DragState {
    start_pos: f32,
    start_time: Instant,
    last_pos: f32,
    last_time: Instant,
    /// Smoothed px/ms estimate, exponentially updated per sample.
    velocity: f32,
    /// Set once cumulative displacement leaves the dead zone.
    engaged: bool,
}

/// Turns a pointer press/move/release sequence into at most one intent.
///
/// On release the gesture navigates when any of these hold:
///   (a) high velocity and more than the minimum distance,
///   (b) medium velocity and more than the medium distance,
///   (c) more than a quarter of the viewport extent,
///   (d) a short flick: modest distance inside a short time window.
/// Direction follows the displacement sign (drag toward negative = advance).
#[derive(Debug)]
pub struct TouchRecognizer {
    cfg: GestureConfig,
    viewport_extent: f32,
    drag: Option<DragState>,
}

impl TouchRecognizer {
    pub fn new(cfg: GestureConfig, viewport_extent: f32) -> Self {
        Self {
            cfg,
            viewport_extent,
            drag: None,
        }
    }

    pub fn set_viewport_extent(&mut self, extent: f32) {
        self.viewport_extent = extent;
    }

    pub fn begin(&mut self, pos: f32, now: Instant) {
        self.drag = Some(DragState {
            start_pos: pos,
            start_time: now,
            last_pos: pos,
            last_time: now,
            velocity: 0.0,
            engaged: false,
        });
    }

    /// Feed a pointer sample. Returns the transient visual offset the feed
    /// should apply on top of its base position (0 until the dead zone is
    /// crossed, so taps never nudge the strip).
    pub fn update(&mut self, pos: f32, now: Instant) -> f32 {
        let Some(drag) = self.drag.as_mut() else {
            return 0.0;
        };
        let dt_ms = duration_ms(now.saturating_duration_since(drag.last_time)).max(MIN_SAMPLE_DT_MS);
        let instant_velocity = (pos - drag.last_pos) / dt_ms;
        let alpha = self.cfg.velocity_smoothing.clamp(0.0, 1.0);
        drag.velocity = alpha * instant_velocity + (1.0 - alpha) * drag.velocity;
        drag.last_pos = pos;
        drag.last_time = now;
        if !drag.engaged && (pos - drag.start_pos).abs() > self.cfg.dead_zone_px {
            drag.engaged = true;
        }
        self.offset()
    }

    /// Release the pointer and evaluate the thresholds.
    pub fn release(&mut self, pos: f32, now: Instant) -> Option<Intent> {
        let drag = self.drag.take()?;
        if !drag.engaged {
            return None;
        }
        let displacement = pos - drag.start_pos;
        let distance = displacement.abs();
        let speed = drag.velocity.abs();
        let elapsed = now.saturating_duration_since(drag.start_time);

        let navigate = (speed > self.cfg.high_velocity && distance > self.cfg.min_distance_px)
            || (speed > self.cfg.mid_velocity && distance > self.cfg.mid_distance_px)
            || distance > self.viewport_extent * VIEWPORT_FRACTION
            || (distance > self.cfg.short_distance_px && elapsed < self.cfg.short_time);

        if !navigate {
            return None;
        }
        if displacement < 0.0 {
            Some(Intent::Advance)
        } else {
            Some(Intent::Retreat)
        }
    }

    /// Abandon the gesture without navigating (pointer capture lost, input
    /// stream ended abnormally). Never leaves half-tracked state behind.
    pub fn cancel(&mut self) {
        self.drag = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.drag.is_some()
    }

    /// Transient offset for in-flight rendering; snaps back to 0 on release
    /// or cancel.
    pub fn offset(&self) -> f32 {
        match &self.drag {
            Some(drag) if drag.engaged => drag.last_pos - drag.start_pos,
            _ => 0.0,
        }
    }
}

/// One wheel event, one decision. Events are never accumulated across calls,
/// so a fast wheel burst steps exactly once per qualifying event instead of
/// jumping several items from a single notch.
#[derive(Debug)]
pub struct WheelRecognizer {
    threshold: f32,
}

impl WheelRecognizer {
    pub fn new(cfg: &GestureConfig) -> Self {
        Self {
            threshold: cfg.wheel_threshold,
        }
    }

    pub fn on_wheel(&self, delta: f32) -> Option<Intent> {
        if delta.abs() <= self.threshold {
            return None;
        }
        if delta > 0.0 {
            Some(Intent::Advance)
        } else {
            Some(Intent::Retreat)
        }
    }
}

/// Snap-to-item scroll container. Scroll offsets are recorded as they
/// arrive; once the stream has been quiet for the debounce window the
/// settled index is `round(offset / item_extent)` clamped to the catalog.
/// While a programmatic scroll (triggered by seek) is in flight, settle
/// detection is suppressed to break the feedback loop.
#[derive(Debug)]
pub struct ScrollSnapRecognizer {
    item_extent: f32,
    debounce: Duration,
    last_scroll: Option<(f32, Instant)>,
    programmatic: bool,
}

impl ScrollSnapRecognizer {
    pub fn new(cfg: &GestureConfig, item_extent: f32) -> Self {
        Self {
            item_extent,
            debounce: cfg.settle_debounce,
            last_scroll: None,
            programmatic: false,
        }
    }

    pub fn set_item_extent(&mut self, extent: f32) {
        self.item_extent = extent;
    }

    pub fn on_scroll(&mut self, offset: f32, now: Instant) {
        if self.programmatic {
            return;
        }
        self.last_scroll = Some((offset, now));
    }

    /// Mark the start of a seek-driven scroll; settle events are ignored
    /// until `end_programmatic`.
    pub fn begin_programmatic(&mut self) {
        self.programmatic = true;
        self.last_scroll = None;
    }

    pub fn end_programmatic(&mut self) {
        self.programmatic = false;
    }

    /// Poll for a settled position. Returns the snapped index at most once
    /// per scroll burst; the caller seeks only when it differs from the
    /// current index.
    pub fn poll_settled(&mut self, now: Instant, catalog_len: usize) -> Option<usize> {
        if self.programmatic || catalog_len == 0 || self.item_extent <= 0.0 {
            return None;
        }
        let (offset, at) = self.last_scroll?;
        if now.saturating_duration_since(at) < self.debounce {
            return None;
        }
        self.last_scroll = None;
        let raw = (offset / self.item_extent).round();
        let idx = if raw <= 0.0 { 0 } else { raw as usize };
        Some(idx.min(catalog_len - 1))
    }
}

fn duration_ms(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}
