use std::collections::{HashMap, HashSet};

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Track;

const MS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// line A touched first, then line B
    Down,
    /// line B touched first, then line A
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub line_a_y: f32,
    pub line_b_y: f32,
    /// Half-height (px) of the band around each line that counts as touching it.
    pub offset: f32,
    /// Real-world distance between the two lines, in meters.
    pub distance_m: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            line_a_y: 198.0,
            line_b_y: 268.0,
            offset: 7.0,
            distance_m: 100.0,
        }
    }
}

impl TimingConfig {
    #[inline]
    fn touches(&self, line_y: f32, cy: f32) -> bool {
        (cy - line_y).abs() < self.offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedEvent {
    pub direction: Direction,
    pub track_id: u32,
    pub speed_kmh: f64,
    /// seconds between the last start-line touch and the end-line touch
    pub elapsed: f64,
    pub timestamp: f64,
}

#[derive(Debug, Default)]
struct Lane {
    first_touch: HashMap<u32, f64>,
    counted: HashSet<u32>,
}

impl Lane {
    /// Returns the elapsed time when this touch completes a crossing.
    fn observe(&mut self, id: u32, on_start: bool, on_end: bool, now: f64) -> Option<f64> {
        // Re-armed every frame inside the start band, so the last touch wins.
        if on_start {
            self.first_touch.insert(id, now);
        }

        if !on_end || self.counted.contains(&id) {
            return None;
        }

        let started = *self.first_touch.get(&id)?;
        let elapsed = now - started;

        if elapsed <= 0.0 || !elapsed.is_finite() {
            debug!(id, elapsed, "ignoring crossing with non-positive elapsed time");
            return None;
        }

        self.counted.insert(id);

        Some(elapsed)
    }

    fn clear(&mut self) {
        self.first_touch.clear();
        self.counted.clear();
    }
}

/// Times tracks between two horizontal scanlines and reports their speed once
/// per direction.
#[derive(Debug)]
pub struct SpeedTimer {
    config: TimingConfig,
    down: Lane,
    up: Lane,
}

impl SpeedTimer {
    pub fn new(config: TimingConfig) -> Self {
        Self {
            config,
            down: Lane::default(),
            up: Lane::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Feeds one track position for the current frame.
    ///
    /// At most one event is produced per call: an end-line touch that
    /// completes a crossing cannot be a start-line touch in the same frame.
    pub fn observe(
        &mut self,
        id: u32,
        centroid: na::Point2<f32>,
        now: f64,
    ) -> Option<SpeedEvent> {
        let on_a = self.config.touches(self.config.line_a_y, centroid.y);
        let on_b = self.config.touches(self.config.line_b_y, centroid.y);

        let down = self.down.observe(id, on_a, on_b, now);
        let up = self.up.observe(id, on_b, on_a, now);

        let (direction, elapsed) = match (down, up) {
            (Some(elapsed), _) => (Direction::Down, elapsed),
            (None, Some(elapsed)) => (Direction::Up, elapsed),
            (None, None) => return None,
        };

        let speed_kmh = self.config.distance_m / elapsed * MS_TO_KMH;
        info!(id, ?direction, speed_kmh, elapsed, "speed measured");

        Some(SpeedEvent {
            direction,
            track_id: id,
            speed_kmh,
            elapsed,
            timestamp: now,
        })
    }

    #[inline]
    pub fn observe_track(&mut self, track: &Track, now: f64) -> Option<SpeedEvent> {
        self.observe(track.track_id, track.centroid(), now)
    }

    /// Number of tracks already measured in `direction`.
    pub fn count(&self, direction: Direction) -> usize {
        match direction {
            Direction::Down => self.down.counted.len(),
            Direction::Up => self.up.counted.len(),
        }
    }

    pub fn is_counted(&self, id: u32, direction: Direction) -> bool {
        match direction {
            Direction::Down => self.down.counted.contains(&id),
            Direction::Up => self.up.counted.contains(&id),
        }
    }

    pub fn reset(&mut self) {
        self.down.clear();
        self.up.clear();
    }
}

impl Default for SpeedTimer {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(y: f32) -> na::Point2<f32> {
        na::Point2::new(400.0, y)
    }

    #[test]
    fn downward_crossing_speed() {
        let mut timer = SpeedTimer::default();

        assert!(timer.observe(7, at(198.0), 10.0).is_none());
        let event = timer.observe(7, at(268.0), 10.5).unwrap();

        assert_eq!(event.direction, Direction::Down);
        assert_eq!(event.track_id, 7);
        assert_relative_eq!(event.speed_kmh, 720.0, epsilon = 1e-9);
        assert_relative_eq!(event.elapsed, 0.5);
        assert_eq!(timer.count(Direction::Down), 1);
        assert!(timer.is_counted(7, Direction::Down));
    }

    #[test]
    fn upward_crossing_speed() {
        let mut timer = SpeedTimer::default();

        timer.observe(3, at(270.0), 5.0);
        let event = timer.observe(3, at(196.0), 6.0).unwrap();

        assert_eq!(event.direction, Direction::Up);
        assert_relative_eq!(event.speed_kmh, 360.0, epsilon = 1e-9);
        assert_eq!(timer.count(Direction::Up), 1);
        assert_eq!(timer.count(Direction::Down), 0);
    }

    #[test]
    fn band_is_strict() {
        let mut timer = SpeedTimer::default();

        // 7 px away from line A is outside the band.
        timer.observe(1, at(205.0), 1.0);
        assert!(timer.observe(1, at(268.0), 2.0).is_none());

        timer.observe(2, at(204.5), 3.0);
        assert!(timer.observe(2, at(274.5), 4.0).is_some());
    }

    #[test]
    fn last_touch_before_crossing_is_used() {
        let mut timer = SpeedTimer::default();

        timer.observe(1, at(194.0), 10.0);
        timer.observe(1, at(198.0), 10.1);
        timer.observe(1, at(203.0), 10.2);
        timer.observe(1, at(230.0), 10.4);

        let event = timer.observe(1, at(268.0), 10.7).unwrap();
        assert_relative_eq!(event.elapsed, 0.5, epsilon = 1e-9);
        assert_relative_eq!(event.speed_kmh, 720.0, epsilon = 1e-6);
    }

    #[test]
    fn end_line_without_start_touch_is_ignored() {
        let mut timer = SpeedTimer::default();

        assert!(timer.observe(2, at(268.0), 1.0).is_none());
        assert!(timer.observe(2, at(300.0), 1.5).is_none());
        assert_eq!(timer.count(Direction::Down), 0);
    }

    #[test]
    fn no_double_count() {
        let mut timer = SpeedTimer::default();

        timer.observe(4, at(198.0), 1.0);
        assert!(timer.observe(4, at(268.0), 2.0).is_some());
        assert!(timer.observe(4, at(266.0), 2.1).is_none());
        assert!(timer.observe(4, at(270.0), 2.2).is_none());

        // Backing over line A reads as an upward crossing and re-arms the
        // downward touch, but the downward measurement never repeats.
        let back = timer.observe(4, at(198.0), 3.0).map(|e| e.direction);
        assert_eq!(back, Some(Direction::Up));
        assert!(timer.observe(4, at(268.0), 4.0).is_none());
        assert_eq!(timer.count(Direction::Down), 1);
    }

    #[test]
    fn zero_elapsed_does_not_emit() {
        let mut timer = SpeedTimer::default();

        timer.observe(5, at(198.0), 10.0);
        assert!(timer.observe(5, at(268.0), 10.0).is_none());
        assert!(!timer.is_counted(5, Direction::Down));

        // A later frame still completes the measurement.
        let event = timer.observe(5, at(268.0), 10.25).unwrap();
        assert_relative_eq!(event.speed_kmh, 1440.0, epsilon = 1e-9);
    }

    #[test]
    fn overlapping_bands_never_divide_by_zero() {
        let config = TimingConfig {
            line_a_y: 100.0,
            line_b_y: 104.0,
            ..Default::default()
        };
        let mut timer = SpeedTimer::new(config);

        assert!(timer.observe(1, at(102.0), 1.0).is_none());
        assert!(timer.observe(1, at(102.0), 1.0).is_none());
        assert_eq!(timer.count(Direction::Down), 0);
        assert_eq!(timer.count(Direction::Up), 0);
    }

    #[test]
    fn reissued_id_is_a_new_vehicle() {
        let mut timer = SpeedTimer::default();

        timer.observe(0, at(198.0), 1.0);
        assert!(timer.observe(0, at(268.0), 2.0).is_some());

        // Same physical car after the tracker lost it: new id, measured again.
        timer.observe(1, at(198.0), 3.0);
        assert!(timer.observe(1, at(268.0), 4.0).is_some());
        assert_eq!(timer.count(Direction::Down), 2);
    }

    #[test]
    fn reset_clears_counts() {
        let mut timer = SpeedTimer::default();

        timer.observe(0, at(198.0), 1.0);
        timer.observe(0, at(268.0), 2.0);
        timer.reset();

        assert_eq!(timer.count(Direction::Down), 0);
        assert!(timer.observe(0, at(268.0), 3.0).is_none());
    }
}
