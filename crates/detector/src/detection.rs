use serde::{Deserialize, Serialize};

/// Axis-aligned box in image pixel coordinates, `(x1, y1)` top-left and
/// `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
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

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Degenerate boxes (`x1 >= x2` or `y1 >= y2`) have zero area.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Smallest box enclosing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x1 <= other.x1 && self.y1 <= other.y1 && self.x2 >= other.x2 && self.y2 >= other.y2
    }
}

/// A detection as produced by a model backend, before ids and uncertainty
/// are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub id: u64,
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f32,
    /// Uncertainty score, see [`crate::uncertainty`]. Not an information entropy.
    pub entropy: f32,
    pub is_uncertain: bool,
}

impl Detection {
    pub fn from_raw(id: u64, raw: RawDetection) -> Self {
        Self {
            id,
            bbox: raw.bbox,
            class_id: raw.class_id,
            class_name: raw.class_name,
            confidence: raw.confidence,
            entropy: 0.0,
            is_uncertain: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_of_degenerate_box_is_zero() {
        let inverted = BoundingBox::new(10.0, 10.0, 5.0, 20.0);
        assert_eq!(inverted.area(), 0.0);

        let flat = BoundingBox::new(0.0, 5.0, 10.0, 5.0);
        assert_eq!(flat.area(), 0.0);
    }

    #[test]
    fn test_union_encloses_both() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(1.0, -2.0, 11.0, 8.0);
        let u = a.union(&b);

        assert_eq!(u, BoundingBox::new(0.0, -2.0, 11.0, 10.0));
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn test_from_raw_resets_uncertainty() {
        let raw = RawDetection {
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            class_id: 2,
            class_name: "pig".to_string(),
            confidence: 0.7,
        };
        let det = Detection::from_raw(42, raw);

        assert_eq!(det.id, 42);
        assert_eq!(det.class_name, "pig");
        assert_eq!(det.entropy, 0.0);
        assert!(!det.is_uncertain);
    }
}
