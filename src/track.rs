use nalgebra as na;
use serde_derive::Serialize;

use crate::bbox::{BBox, Ltrb};

/// One tracker output record: the input box echoed with its resolved identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Track {
    pub track_id: u32,
    pub bbox: BBox<Ltrb>,
}

impl Track {
    #[inline]
    pub fn centroid(&self) -> na::Point2<f32> {
        self.bbox.centroid()
    }
}
