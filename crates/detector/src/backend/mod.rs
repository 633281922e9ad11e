use crate::detection::RawDetection;
use image::RgbImage;
use std::path::Path;

#[cfg(feature = "ort-backend")]
pub mod ort;

#[cfg(feature = "fixture-backend")]
pub mod fixture;

/// Per-request settings forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictOptions {
    pub confidence_threshold: f32,
    /// Threshold for the backend's own coarse NMS, applied before merging.
    pub iou_threshold: f32,
    pub input_size: u32,
}

/// A loaded detection model. One instance is never invoked concurrently.
pub trait DetectionBackend: Send {
    fn load_model(path: &Path) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run detection on a decoded RGB image, boxes in its pixel space.
    fn predict(
        &mut self,
        image: &RgbImage,
        options: &PredictOptions,
    ) -> anyhow::Result<Vec<RawDetection>>;
}
