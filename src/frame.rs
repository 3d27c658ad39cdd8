use std::io::BufRead;

use serde_derive::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Frame {
    pub timestamp: f64, // in seconds
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            timestamp,
            detections,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Reads one JSON `Frame` per line, skipping blank lines.
pub fn read_frames<R: BufRead>(reader: R) -> impl Iterator<Item = Result<Frame, Error>> {
    reader.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str::<Frame>(&line).map_err(Error::from)),
        Err(err) => Some(Err(Error::from(err))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_json_lines() {
        let input = r#"{"timestamp": 0.0, "detections": [{"x1": 10, "y1": 20, "x2": 50, "y2": 60, "p": 0.9, "c": 2}]}

{"timestamp": 0.04}
"#;
        let frames: Vec<_> = read_frames(input.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 1);
        assert_eq!(frames[0].detections[0].class, 2);
        assert_eq!(frames[0].detections[0].confidence, 0.9);
        assert_eq!(frames[0].detections[0].bbox().centroid().x, 30.0);
        assert!(frames[1].is_empty());
        assert_eq!(frames[1].timestamp, 0.04);
    }

    #[test]
    fn detection_defaults() {
        let line = r#"{"timestamp": 1.5, "detections": [{"x1": 0, "y1": 0, "x2": 4, "y2": 4}]}"#;
        let frame: Frame = serde_json::from_str(line).unwrap();

        assert_eq!(frame.detections[0].confidence, 1.0);
        assert_eq!(frame.detections[0].class, 0);
    }

    #[test]
    fn bad_line_is_frame_error() {
        let mut frames = read_frames("{\"timestamp\": }\n".as_bytes());

        assert!(matches!(frames.next(), Some(Err(Error::FrameError(_)))));
        assert!(frames.next().is_none());
    }
}
