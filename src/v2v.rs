//! Range-gated vehicle-to-vehicle speed sharing.
//!
//! A logical simulation over tracker output: every tracked vehicle is a node at
//! its centroid, and a measured speed is delivered to every other node within
//! `communication_range` pixels of the sender. Nothing is put on a wire.

use std::collections::{BTreeMap, VecDeque};

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::timing::Direction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V2vConfig {
    /// px, inclusive
    pub communication_range: f32,
    /// seconds a received speed stays in an inbox
    pub inbox_expiry: f64,
    /// seconds a broadcast stays in the recent log
    pub broadcast_history: f64,
    /// seconds without a position update before a node is removed
    pub vehicle_timeout: f64,
}

impl Default for V2vConfig {
    fn default() -> Self {
        Self {
            communication_range: 180.0,
            inbox_expiry: 8.0,
            broadcast_history: 5.0,
            vehicle_timeout: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReceivedSpeed {
    pub from: u32,
    pub speed_kmh: f64,
    pub direction: Direction,
    pub timestamp: f64,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Broadcast {
    pub sender: u32,
    pub speed_kmh: f64,
    pub direction: Direction,
    pub position: (f32, f32),
    pub recipients: Vec<u32>,
    pub timestamp: f64,
}

#[derive(Debug, Clone)]
pub struct VehicleNode {
    pub id: u32,
    pub position: na::Point2<f32>,
    pub speed_kmh: Option<f64>,
    pub direction: Option<Direction>,
    pub updated_at: f64,
    inbox: Vec<ReceivedSpeed>,
}

impl VehicleNode {
    fn new(id: u32, position: na::Point2<f32>, now: f64) -> Self {
        Self {
            id,
            position,
            speed_kmh: None,
            direction: None,
            updated_at: now,
            inbox: Vec::new(),
        }
    }

    /// Speeds received from other vehicles, oldest first.
    #[inline]
    pub fn inbox(&self) -> &[ReceivedSpeed] {
        &self.inbox
    }

    /// Latest speed heard from each sender.
    pub fn nearby_speeds(&self) -> BTreeMap<u32, ReceivedSpeed> {
        self.inbox.iter().map(|r| (r.from, *r)).collect()
    }

    #[inline]
    pub fn distance_to(&self, other: &VehicleNode) -> f32 {
        na::distance(&self.position, &other.position)
    }
}

#[derive(Debug)]
pub struct V2vNetwork {
    config: V2vConfig,
    vehicles: BTreeMap<u32, VehicleNode>,
    broadcasts: VecDeque<Broadcast>,
}

impl V2vNetwork {
    pub fn new(config: V2vConfig) -> Self {
        Self {
            config,
            vehicles: BTreeMap::new(),
            broadcasts: VecDeque::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &V2vConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    #[inline]
    pub fn vehicle(&self, id: u32) -> Option<&VehicleNode> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleNode> {
        self.vehicles.values()
    }

    pub fn upsert_vehicle(&mut self, id: u32, position: na::Point2<f32>, now: f64) {
        self.vehicles
            .entry(id)
            .and_modify(|v| {
                v.position = position;
                v.updated_at = now;
            })
            .or_insert_with(|| VehicleNode::new(id, position, now));
    }

    /// Delivers `speed_kmh` from `sender` to every other vehicle in range and
    /// returns the recipients. An unknown sender reaches nobody.
    pub fn broadcast(
        &mut self,
        sender: u32,
        speed_kmh: f64,
        direction: Direction,
        now: f64,
    ) -> Vec<u32> {
        let position = match self.vehicles.get_mut(&sender) {
            Some(v) => {
                v.speed_kmh = Some(speed_kmh);
                v.direction = Some(direction);
                v.position
            }
            None => return Vec::new(),
        };

        let range = self.config.communication_range;
        let mut recipients = Vec::new();

        for (&id, receiver) in self.vehicles.iter_mut() {
            if id == sender {
                continue;
            }

            let distance = na::distance(&position, &receiver.position);
            if distance <= range {
                receiver.inbox.push(ReceivedSpeed {
                    from: sender,
                    speed_kmh,
                    direction,
                    timestamp: now,
                    distance,
                });
                recipients.push(id);
            }
        }

        debug!(sender, speed_kmh, recipients = recipients.len(), "speed broadcast");

        if !recipients.is_empty() {
            self.broadcasts.push_back(Broadcast {
                sender,
                speed_kmh,
                direction,
                position: (position.x, position.y),
                recipients: recipients.clone(),
                timestamp: now,
            });
        }

        recipients
    }

    /// Other vehicles within range of `id`, with their distance.
    pub fn vehicles_in_range(&self, id: u32) -> Vec<(u32, f32)> {
        let vehicle = match self.vehicles.get(&id) {
            Some(v) => v,
            None => return Vec::new(),
        };

        self.vehicles
            .values()
            .filter(|other| other.id != id)
            .map(|other| (other.id, vehicle.distance_to(other)))
            .filter(|&(_, d)| d <= self.config.communication_range)
            .collect()
    }

    /// Unordered pairs of vehicles that can hear each other, lower id first.
    pub fn communication_pairs(&self) -> Vec<(u32, u32)> {
        let nodes: Vec<_> = self.vehicles.values().collect();
        let mut pairs = Vec::new();

        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                if a.distance_to(b) <= self.config.communication_range {
                    pairs.push((a.id, b.id));
                }
            }
        }

        pairs
    }

    #[inline]
    pub fn recent_broadcasts(&self) -> impl Iterator<Item = &Broadcast> {
        self.broadcasts.iter()
    }

    #[inline]
    pub fn last_broadcast(&self) -> Option<&Broadcast> {
        self.broadcasts.back()
    }

    /// Drops stale inbox entries, old broadcasts and vehicles no longer updated.
    pub fn expire(&mut self, now: f64) {
        let cfg = &self.config;

        self.vehicles.retain(|id, v| {
            let alive = now - v.updated_at <= cfg.vehicle_timeout;
            if !alive {
                debug!(id, "vehicle left the network");
            }
            alive
        });

        for v in self.vehicles.values_mut() {
            v.inbox.retain(|r| now - r.timestamp <= cfg.inbox_expiry);
        }

        while let Some(b) = self.broadcasts.front() {
            if now - b.timestamp <= cfg.broadcast_history {
                break;
            }
            self.broadcasts.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.vehicles.clear();
        self.broadcasts.clear();
    }
}

impl Default for V2vNetwork {
    fn default() -> Self {
        Self::new(V2vConfig::default())
    }
}
