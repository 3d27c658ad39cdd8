pub mod bbox;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod timing;
pub mod tracker;
pub mod v2v;

mod track;

pub use config::Config;
pub use detection::Detection;
pub use frame::Frame;
pub use pipeline::{FrameReport, SpeedPipeline};
pub use timing::{Direction, SpeedEvent, SpeedTimer};
pub use track::Track;
pub use tracker::CentroidTracker;
pub use v2v::V2vNetwork;

use bbox::{BBox, Ltrb};

/// Frame-to-frame identity assignment over vehicle boxes.
///
/// `update` is called once per frame, in capture order; its result holds one
/// record per accepted box, in input order.
pub trait Tracking {
    fn update(&mut self, boxes: &[BBox<Ltrb>]) -> Vec<Track>;
    fn reset(&mut self);
}
