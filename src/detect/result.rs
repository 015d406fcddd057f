use serde::{Deserialize, Serialize};

use crate::error::MalformedDetection;

/// Axis-aligned box in pixel coordinates (`x1,y1` top-left, `x2,y2` bottom-right).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 as f64 - self.x1 as f64
    }

    pub fn height(&self) -> f64 {
        self.y2 as f64 - self.y1 as f64
    }

    /// Width times height. Negative when exactly one extent is negative; callers
    /// validate the box first.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let left = self.x1.max(other.x1) as f64;
        let top = self.y1.max(other.y1) as f64;
        let right = self.x2.min(other.x2) as f64;
        let bottom = self.y2.min(other.y2) as f64;
        (right - left).max(0.0) * (bottom - top).max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let intersection = self.intersection_area(other);
        let union = self.area().max(0.0) + other.area().max(0.0) - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

/// One tracked object in one frame, as reported by the external tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "id")]
    pub track_id: u64,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(rename = "conf")]
    pub confidence: f32,
}

impl Detection {
    pub fn new(track_id: u64, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            track_id,
            bbox,
            confidence,
        }
    }

    /// Check the detection is well formed: finite coordinates, non-negative
    /// extents and a confidence inside `[0, 1]`.
    pub fn validate(&self) -> Result<(), MalformedDetection> {
        validate_observation(self.track_id, &self.bbox, self.confidence)
    }
}

pub(crate) fn validate_observation(
    track_id: u64,
    bbox: &BoundingBox,
    confidence: f32,
) -> Result<(), MalformedDetection> {
    if !bbox.is_finite() {
        return Err(MalformedDetection::NonFiniteBox { track_id });
    }
    let (width, height) = (bbox.width(), bbox.height());
    if width < 0.0 || height < 0.0 {
        return Err(MalformedDetection::NegativeExtent {
            track_id,
            width,
            height,
        });
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(MalformedDetection::ConfidenceOutOfRange {
            track_id,
            confidence,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_and_extents() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 25.0);
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 5.0);
        assert_eq!(b.area(), 100.0);
    }

    #[test]
    fn iou_of_overlapping_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-9);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn validate_flags_each_defect() {
        let ok = Detection::new(1, BoundingBox::new(0.0, 0.0, 4.0, 4.0), 0.5);
        assert!(ok.validate().is_ok());

        let inverted = Detection::new(2, BoundingBox::new(5.0, 0.0, 1.0, 4.0), 0.5);
        assert!(matches!(
            inverted.validate(),
            Err(MalformedDetection::NegativeExtent { track_id: 2, .. })
        ));

        let nan = Detection::new(3, BoundingBox::new(f32::NAN, 0.0, 1.0, 4.0), 0.5);
        assert_eq!(
            nan.validate(),
            Err(MalformedDetection::NonFiniteBox { track_id: 3 })
        );

        let overconfident = Detection::new(4, BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1.5);
        assert!(matches!(
            overconfident.validate(),
            Err(MalformedDetection::ConfidenceOutOfRange { track_id: 4, .. })
        ));
    }

    #[test]
    fn detection_json_uses_tracker_field_names() {
        let det: Detection =
            serde_json::from_str(r#"{"id": 7, "box": [1.0, 2.0, 3.0, 4.0], "conf": 0.75}"#)
                .unwrap();
        assert_eq!(det.track_id, 7);
        assert_eq!(det.bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(det.confidence, 0.75);
    }
}
