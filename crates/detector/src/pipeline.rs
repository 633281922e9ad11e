use crate::backend::{DetectionBackend, PredictOptions};
use crate::detection::Detection;
use crate::errors::{DetectorError, Result};
use crate::merge::merge_overlapping;
use crate::params::DetectorConfig;
use crate::processing::decode::decode_image;
use crate::state::DetectorState;
use crate::uncertainty::score_detections;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DetectOutput {
    pub detections: Vec<Detection>,
    /// Wall-clock time spent holding the detector lock.
    pub elapsed: Duration,
}

impl<B: DetectionBackend> DetectorState<B> {
    /// Decode, infer, merge and score one image.
    ///
    /// The detector lock is held for the whole run; the backend is not safe
    /// for concurrent use, so concurrent callers are serialized here.
    pub fn detect(&self, image_data: &[u8], image_format: &str) -> Result<DetectOutput> {
        let mut inner = self.lock();
        let start = Instant::now();

        let config = inner.config;
        let detections = run_pipeline(
            &mut inner.model.active,
            &config,
            &self.next_id,
            image_data,
            image_format,
        )?;
        let elapsed = start.elapsed();
        drop(inner);

        Ok(DetectOutput {
            detections,
            elapsed,
        })
    }
}

fn run_pipeline<B: DetectionBackend>(
    backend: &mut B,
    config: &DetectorConfig,
    ids: &AtomicU64,
    image_data: &[u8],
    image_format: &str,
) -> Result<Vec<Detection>> {
    let _s = common::span!("detect_pipeline");

    let image = decode_image(image_data, image_format)?;

    let options = PredictOptions {
        confidence_threshold: config.confidence_threshold as f32,
        iou_threshold: config.nms_iou_threshold as f32,
        input_size: config.input_size,
    };

    let raw = backend
        .predict(&image, &options)
        .map_err(DetectorError::Inference)?;
    let raw_count = raw.len();

    let detections: Vec<Detection> = raw
        .into_iter()
        .map(|r| Detection::from_raw(ids.fetch_add(1, Ordering::Relaxed) + 1, r))
        .collect();

    let mut detections = {
        let _s = common::span_debug!("merge_overlapping");
        merge_overlapping(detections, config.nms_iou_threshold as f32)
    };

    {
        let _s = common::span_debug!("score_detections");
        score_detections(&mut detections, config.entropy_threshold as f32);
    }

    tracing::debug!(
        raw_count,
        merged_count = detections.len(),
        uncertain = detections.iter().filter(|d| d.is_uncertain).count(),
        "Pipeline finished"
    );

    Ok(detections)
}
