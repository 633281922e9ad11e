use crate::detection::BoundingBox;

/// Intersection over union of two boxes.
///
/// Returns exactly `0.0` when the boxes do not overlap or when the union
/// area is zero (both boxes degenerate).
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
}
