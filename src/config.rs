use std::fs;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::timing::TimingConfig;
use crate::tracker::TrackerConfig;
use crate::v2v::V2vConfig;

/// COCO class id of `car`
pub const CAR_CLASS: i32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub timing: TimingConfig,
    pub v2v: V2vConfig,
    /// Detector classes handed to the tracker; everything else is dropped.
    pub vehicle_classes: Vec<i32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            timing: TimingConfig::default(),
            v2v: V2vConfig::default(),
            vehicle_classes: vec![CAR_CLASS],
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        fn positive(name: &str, value: f64) -> Result<(), Error> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        }

        positive(
            "tracker.distance_threshold",
            self.tracker.distance_threshold as f64,
        )?;
        positive("timing.offset", self.timing.offset as f64)?;
        positive("timing.distance_m", self.timing.distance_m)?;
        positive(
            "v2v.communication_range",
            self.v2v.communication_range as f64,
        )?;
        positive("v2v.inbox_expiry", self.v2v.inbox_expiry)?;
        positive("v2v.broadcast_history", self.v2v.broadcast_history)?;
        positive("v2v.vehicle_timeout", self.v2v.vehicle_timeout)?;

        if !self.timing.line_a_y.is_finite() || !self.timing.line_b_y.is_finite() {
            return Err(Error::InvalidConfig(
                "timing lines must be finite".to_string(),
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn is_vehicle(&self, class: i32) -> bool {
        self.vehicle_classes.contains(&class)
    }
}
