use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bbox::{BBox, Ltrb};
use crate::Track;

pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 35.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Centroid distance (px) under which a detection continues a live track.
    pub distance_threshold: f32,
    /// Frames a track survives without a match; 0 drops it on the first miss.
    pub max_missed_frames: u32,
}

impl TrackerConfig {
    pub fn new(distance_threshold: f32) -> Self {
        Self {
            distance_threshold,
            max_missed_frames: 0,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_THRESHOLD)
    }
}

#[derive(Debug, Clone)]
struct Entity {
    id: u32,
    centroid: na::Point2<f32>,
    missed: u32,
}

/// Greedy nearest-centroid tracker.
///
/// Detections are matched in input order against the live tracks in insertion
/// order; the first unbound track closer than `distance_threshold` wins. This is
/// not an optimal assignment: crossing trajectories can swap identities.
#[derive(Debug)]
pub struct CentroidTracker {
    config: TrackerConfig,
    entities: Vec<Entity>,
    next_id: u32,
}

impl CentroidTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            entities: Vec::with_capacity(64),
            next_id: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of live tracks carried into the next call.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Id the next new track will receive.
    #[inline]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn centroid(&self, id: u32) -> Option<na::Point2<f32>> {
        self.entities
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.centroid)
    }

    pub fn live_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entities.iter().map(|e| e.id)
    }

    /// Assigns an id to every box of the current frame.
    ///
    /// Output follows input order. Boxes with non-finite coordinates are
    /// skipped and produce no record.
    pub fn update(&mut self, boxes: &[BBox<Ltrb>]) -> Vec<Track> {
        let threshold = self.config.distance_threshold;
        let mut bound = vec![false; self.entities.len()];
        let mut next = Vec::with_capacity(boxes.len());
        let mut tracks = Vec::with_capacity(boxes.len());

        for bbox in boxes {
            if !bbox.is_finite() {
                warn!(bbox = ?bbox.as_slice(), "skipping detection with non-finite coordinates");
                continue;
            }

            let centroid = bbox.centroid();
            let matched = self
                .entities
                .iter()
                .enumerate()
                .find(|(idx, e)| !bound[*idx] && na::distance(&e.centroid, &centroid) < threshold)
                .map(|(idx, e)| (idx, e.id));

            let id = match matched {
                Some((idx, id)) => {
                    bound[idx] = true;
                    id
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    debug!(id, cx = centroid.x, cy = centroid.y, "new track");
                    id
                }
            };

            next.push(Entity {
                id,
                centroid,
                missed: 0,
            });

            tracks.push(Track {
                track_id: id,
                bbox: *bbox,
            });
        }

        let max_missed = self.config.max_missed_frames;
        let prev = std::mem::take(&mut self.entities);

        for (entity, _) in prev.into_iter().zip(bound).filter(|(_, b)| !b) {
            if entity.missed < max_missed {
                next.push(Entity {
                    missed: entity.missed + 1,
                    ..entity
                });
            } else {
                debug!(id = entity.id, "track lost");
            }
        }

        self.entities = next;

        tracks
    }

    /// Forgets every live track. Ids keep counting up and are never reissued.
    pub fn reset(&mut self) {
        self.entities.clear();
    }
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl crate::Tracking for CentroidTracker {
    #[inline]
    fn update(&mut self, boxes: &[BBox<Ltrb>]) -> Vec<Track> {
        CentroidTracker::update(self, boxes)
    }

    #[inline]
    fn reset(&mut self) {
        CentroidTracker::reset(self)
    }
}
