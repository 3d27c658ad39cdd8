use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Detector output: corners (x1,y1) - (x2,y2) in frame pixels, no identity
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(rename = "p", default = "default_confidence")]
    pub confidence: f32,
    #[serde(rename = "c", default)]
    pub class: i32,
}

fn default_confidence() -> f32 {
    1.0
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, class: i32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence: default_confidence(),
            class,
        }
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Ltrb> {
        BBox::ltrb(self.x1, self.y1, self.x2, self.y2)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.bbox().is_finite()
    }
}

impl From<BBox<Ltrb>> for Detection {
    fn from(b: BBox<Ltrb>) -> Self {
        Self::new(b.left(), b.top(), b.right(), b.bottom(), 0)
    }
}
