//! Flags detections that need a human look.
//!
//! `score = 0.7 * (1 - confidence) + 0.3 * max_iou`, where `max_iou` is the
//! largest overlap with any other detection in the frame regardless of class.
//! With confidence and IoU in `[0, 1]` the score stays in `[0, 1]`.

use crate::detection::Detection;
use crate::geometry::iou;

pub const CONFIDENCE_WEIGHT: f32 = 0.7;
pub const OVERLAP_WEIGHT: f32 = 0.3;

pub fn uncertainty_score(confidence: f32, max_iou: f32) -> f32 {
    CONFIDENCE_WEIGHT * (1.0 - confidence) + OVERLAP_WEIGHT * max_iou
}

/// Assigns `entropy` and `is_uncertain` on every detection in place.
///
/// Quadratic in the number of detections, which is fine for post-merge frame
/// counts.
pub fn score_detections(detections: &mut [Detection], entropy_threshold: f32) {
    let max_ious: Vec<f32> = (0..detections.len())
        .map(|i| {
            detections
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| iou(&detections[i].bbox, &other.bbox))
                .fold(0.0f32, f32::max)
        })
        .collect();

    for (det, max_iou) in detections.iter_mut().zip(max_ious) {
        let score = uncertainty_score(det.confidence, max_iou);
        det.entropy = score;
        det.is_uncertain = score > entropy_threshold;
    }
}
