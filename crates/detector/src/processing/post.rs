use crate::detection::{BoundingBox, RawDetection};
use crate::geometry::iou;
use crate::processing::pre::Letterbox;

/// Decodes single-output YOLO heads of shape `[1, 4 + num_classes, anchors]`,
/// boxes in center-size input pixels and class scores already activated.
pub struct PostProcessor {
    class_names: Vec<String>,
}

impl PostProcessor {
    pub fn new(class_names: Vec<String>) -> Self {
        Self { class_names }
    }

    pub fn class_name(&self, class_id: u32) -> String {
        self.class_names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }

    #[tracing::instrument(skip(self, output, letterbox))]
    pub fn parse_detections(
        &self,
        output: &ndarray::ArrayViewD<f32>,
        letterbox: &Letterbox,
        orig_width: u32,
        orig_height: u32,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            anyhow::bail!("Unexpected model output shape {:?}", shape);
        }

        let num_classes = shape[1] - 4;
        let num_anchors = shape[2];
        let mut candidates = Vec::new();

        for a in 0..num_anchors {
            let mut best_score = f32::NEG_INFINITY;
            let mut best_class = 0usize;
            for c in 0..num_classes {
                let score = output[[0, 4 + c, a]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < confidence_threshold {
                continue;
            }

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(
                output[[0, 0, a]],
                output[[0, 1, a]],
                output[[0, 2, a]],
                output[[0, 3, a]],
            );

            let bbox = BoundingBox::new(
                unletterbox(x1, letterbox.offset_x, letterbox.scale, orig_width),
                unletterbox(y1, letterbox.offset_y, letterbox.scale, orig_height),
                unletterbox(x2, letterbox.offset_x, letterbox.scale, orig_width),
                unletterbox(y2, letterbox.offset_y, letterbox.scale, orig_height),
            );

            candidates.push(RawDetection {
                bbox,
                class_id: best_class as u32,
                class_name: self.class_name(best_class as u32),
                confidence: best_score,
            });
        }

        let kept = suppress(candidates, iou_threshold);
        tracing::trace!(count = kept.len(), "Decoded detections");
        Ok(kept)
    }
}

/// Classic per-class suppression: keeps the most confident box and drops
/// same-class boxes overlapping it above `iou_threshold`.
pub fn suppress(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

/// Parses the `names` entry Ultralytics writes into exported model metadata,
/// e.g. `{0: 'cow', 1: 'pig'}`. Ids missing from the map get `class_<id>`.
pub fn parse_class_names(raw: &str) -> Vec<String> {
    let mut entries: Vec<(usize, String)> = raw
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|entry| {
            let (id, name) = entry.split_once(':')?;
            let id = id.trim().parse().ok()?;
            let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
            Some((id, name.to_string()))
        })
        .collect();
    entries.sort_by_key(|(id, _)| *id);

    let len = entries.last().map(|(id, _)| id + 1).unwrap_or(0);
    let mut names: Vec<String> = (0..len).map(|id| format!("class_{id}")).collect();
    for (id, name) in entries {
        names[id] = name;
    }
    names
}

#[inline]
fn unletterbox(v: f32, offset: f32, scale: f32, limit: u32) -> f32 {
    ((v - offset) / scale).clamp(0.0, limit as f32)
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    (cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn identity_letterbox() -> Letterbox {
        Letterbox {
            input_size: 640,
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Builds a `[1, 4 + num_classes, n]` head from (cxcywh, class, score)
    fn yolo_output(anchors: &[([f32; 4], usize, f32)], num_classes: usize) -> Array<f32, IxDyn> {
        let n = anchors.len();
        let mut out = Array::zeros(IxDyn(&[1, 4 + num_classes, n]));
        for (a, (bbox, class, score)) in anchors.iter().enumerate() {
            for k in 0..4 {
                out[[0, k, a]] = bbox[k];
            }
            out[[0, 4 + class, a]] = *score;
        }
        out
    }

    fn names() -> Vec<String> {
        vec!["cow".to_string(), "pig".to_string(), "sheep".to_string()]
    }

    #[test]
    fn test_cxcywh_to_xyxy() {
        let (x1, y1, x2, y2) = cxcywh_to_xyxy(50.0, 40.0, 20.0, 10.0);
        assert_eq!((x1, y1, x2, y2), (40.0, 35.0, 60.0, 45.0));
    }

    #[test]
    fn test_confidence_filter_and_class_argmax() {
        let output = yolo_output(
            &[
                ([100.0, 100.0, 20.0, 20.0], 1, 0.9),
                ([300.0, 300.0, 20.0, 20.0], 2, 0.3),
                ([500.0, 100.0, 40.0, 20.0], 0, 0.6),
            ],
            3,
        );
        let post = PostProcessor::new(names());
        let dets = post
            .parse_detections(&output.view(), &identity_letterbox(), 640, 640, 0.5, 0.8)
            .unwrap();

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_name, "pig");
        assert_eq!(dets[0].bbox, BoundingBox::new(90.0, 90.0, 110.0, 110.0));
        assert_eq!(dets[1].class_name, "cow");
        assert!((dets[1].confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_inverse_letterbox_and_clamp() {
        // 800x600 into 640: scale 0.8, offset_y 40
        let letterbox = Letterbox {
            input_size: 640,
            scale: 0.8,
            offset_x: 0.0,
            offset_y: 40.0,
        };
        let output = yolo_output(
            &[
                ([320.0, 320.0, 160.0, 160.0], 0, 0.9),
                ([630.0, 45.0, 40.0, 20.0], 1, 0.9),
            ],
            3,
        );
        let post = PostProcessor::new(names());
        let dets = post
            .parse_detections(&output.view(), &letterbox, 800, 600, 0.5, 0.8)
            .unwrap();

        let centered = dets.iter().find(|d| d.class_id == 0).unwrap();
        assert!((centered.bbox.x1 - 300.0).abs() < 1e-3);
        assert!((centered.bbox.y1 - 250.0).abs() < 1e-3);
        assert!((centered.bbox.x2 - 500.0).abs() < 1e-3);
        assert!((centered.bbox.y2 - 450.0).abs() < 1e-3);

        let edge = dets.iter().find(|d| d.class_id == 1).unwrap();
        assert_eq!(edge.bbox.y1, 0.0, "Clamped to the top edge");
        assert_eq!(edge.bbox.x2, 800.0, "Clamped to the right edge");
    }

    #[test]
    fn test_coarse_suppression_drops_same_class_overlap() {
        let output = yolo_output(
            &[
                ([100.0, 100.0, 50.0, 50.0], 0, 0.9),
                ([101.0, 101.0, 50.0, 50.0], 0, 0.8),
                ([101.0, 101.0, 50.0, 50.0], 1, 0.7),
            ],
            3,
        );
        let post = PostProcessor::new(names());
        let dets = post
            .parse_detections(&output.view(), &identity_letterbox(), 640, 640, 0.5, 0.8)
            .unwrap();

        assert_eq!(dets.len(), 2);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(dets[1].class_id, 1);
    }

    #[test]
    fn test_rejects_unexpected_shape() {
        let post = PostProcessor::new(names());
        for shape in [&[1, 4, 300][..], &[300, 7][..], &[2, 7, 300][..]] {
            let output = Array::<f32, IxDyn>::zeros(IxDyn(shape));
            let result =
                post.parse_detections(&output.view(), &identity_letterbox(), 640, 640, 0.5, 0.8);
            assert!(result.is_err(), "{:?} should be rejected", shape);
        }
    }

    #[test]
    fn test_unknown_class_gets_placeholder_name() {
        let post = PostProcessor::new(names());
        assert_eq!(post.class_name(7), "class_7");
    }

    #[test]
    fn test_parse_class_names() {
        let names = parse_class_names("{0: 'cow', 1: 'pig', 3: \"goat\"}");
        assert_eq!(names, vec!["cow", "pig", "class_2", "goat"]);
        assert!(parse_class_names("").is_empty());
    }
}
