//! Same-class duplicate merging.
//!
//! Unlike suppression NMS, overlapping same-class boxes are folded into their
//! enclosing box: in livestock footage a single animal is often split across
//! several partial boxes, and dropping the weaker ones would lose extent.

use crate::detection::Detection;
use crate::geometry::iou;

/// Merge same-class detections whose IoU strictly exceeds `iou_threshold`.
///
/// Repeats [`merge_pass`] until a pass merges nothing, so the output is
/// stable: merging it again is a no-op.
pub fn merge_overlapping(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    loop {
        let before = detections.len();
        detections = merge_pass(detections, iou_threshold);
        if detections.len() == before {
            return detections;
        }
    }
}

/// One greedy pass over the detections in descending confidence order.
///
/// Each unconsumed detection claims every other unconsumed detection of the
/// same class overlapping it above the threshold. A claimed group collapses
/// into the union box carrying the identity and confidence of its most
/// confident member. Ties in confidence keep input order.
pub fn merge_pass(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.len() <= 1 {
        return detections;
    }

    // stable sort: equal confidences keep discovery order
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut consumed = vec![false; detections.len()];
    let mut kept = Vec::with_capacity(detections.len());

    for i in 0..detections.len() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;

        let current = &detections[i];
        let mut merged_box = current.bbox;
        let mut group_size = 1usize;

        for j in (i + 1)..detections.len() {
            if consumed[j] {
                continue;
            }

            let other = &detections[j];
            if other.class_id != current.class_id {
                continue;
            }

            if iou(&current.bbox, &other.bbox) > iou_threshold {
                consumed[j] = true;
                merged_box = merged_box.union(&other.bbox);
                group_size += 1;
            }
        }

        if group_size == 1 {
            kept.push(current.clone());
        } else {
            tracing::trace!(
                id = current.id,
                class_id = current.class_id,
                group_size,
                "Merged overlapping detections"
            );
            kept.push(Detection {
                bbox: merged_box,
                entropy: 0.0,
                is_uncertain: false,
                ..current.clone()
            });
        }
    }

    kept
}
