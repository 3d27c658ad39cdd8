use serde_derive::Serialize;
use tracing::debug;

use crate::bbox::{BBox, Ltrb};
use crate::config::Config;
use crate::timing::{SpeedEvent, SpeedTimer};
use crate::tracker::CentroidTracker;
use crate::v2v::{Broadcast, V2vNetwork};
use crate::{Frame, Track, Tracking};

/// Everything one frame produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameReport {
    pub timestamp: f64,
    pub tracks: Vec<Track>,
    pub events: Vec<SpeedEvent>,
    pub broadcasts: Vec<Broadcast>,
}

/// Per-frame composition: class filter, tracking, line timing, V2V sharing.
///
/// Frames must be fed in capture order; each call finishes mutating every
/// component before returning.
pub struct SpeedPipeline<T: Tracking = CentroidTracker> {
    vehicle_classes: Vec<i32>,
    tracker: T,
    timer: SpeedTimer,
    network: V2vNetwork,
}

impl SpeedPipeline<CentroidTracker> {
    pub fn new(config: Config) -> Self {
        let tracker = CentroidTracker::new(config.tracker.clone());

        Self::with_tracker(config, tracker)
    }
}

impl Default for SpeedPipeline<CentroidTracker> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<T: Tracking> SpeedPipeline<T> {
    pub fn with_tracker(config: Config, tracker: T) -> Self {
        Self {
            vehicle_classes: config.vehicle_classes,
            tracker,
            timer: SpeedTimer::new(config.timing),
            network: V2vNetwork::new(config.v2v),
        }
    }

    pub fn process(&mut self, frame: &Frame) -> FrameReport {
        let now = frame.timestamp;

        let boxes: Vec<BBox<Ltrb>> = frame
            .iter()
            .filter(|d| self.vehicle_classes.contains(&d.class))
            .map(|d| d.bbox())
            .collect();

        let tracks = self.tracker.update(&boxes);
        let mut events = Vec::new();

        for track in &tracks {
            if let Some(event) = self.timer.observe_track(track, now) {
                events.push(event);
            }

            self.network.upsert_vehicle(track.track_id, track.centroid(), now);
        }

        let mut broadcasts = Vec::new();
        for event in &events {
            let recipients =
                self.network
                    .broadcast(event.track_id, event.speed_kmh, event.direction, now);

            if !recipients.is_empty() {
                broadcasts.extend(self.network.last_broadcast().cloned());
            }
        }

        self.network.expire(now);

        debug!(
            timestamp = now,
            detections = frame.len(),
            vehicles = boxes.len(),
            tracks = tracks.len(),
            events = events.len(),
            "frame processed"
        );

        FrameReport {
            timestamp: now,
            tracks,
            events,
            broadcasts,
        }
    }

    /// Clears every component, as on a video restart.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.timer.reset();
        self.network.clear();
    }

    #[inline]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    #[inline]
    pub fn timer(&self) -> &SpeedTimer {
        &self.timer
    }

    #[inline]
    pub fn network(&self) -> &V2vNetwork {
        &self.network
    }
}
