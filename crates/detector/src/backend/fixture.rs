//! Replays detections from a JSON "model" file instead of running a network.
//!
//! ```json
//! { "detections": [ { "bbox": { "x1": 0, "y1": 0, "x2": 10, "y2": 10 },
//!                     "class_id": 0, "class_name": "cow", "confidence": 0.9 } ],
//!   "fail_with": null }
//! ```

use super::{DetectionBackend, PredictOptions};
use crate::detection::RawDetection;
use anyhow::Context;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureModel {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    /// When set, every `predict` call fails with this message.
    #[serde(default)]
    pub fail_with: Option<String>,
}

impl FixtureModel {
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)
            .with_context(|| format!("Failed to write fixture model {}", path.display()))
    }
}

pub struct FixtureBackend {
    model: FixtureModel,
}

impl DetectionBackend for FixtureBackend {
    fn load_model(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read fixture model {}", path.display()))?;
        let model: FixtureModel = serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed fixture model {}", path.display()))?;

        Ok(Self { model })
    }

    fn predict(
        &mut self,
        _image: &RgbImage,
        options: &PredictOptions,
    ) -> anyhow::Result<Vec<RawDetection>> {
        if let Some(message) = &self.model.fail_with {
            anyhow::bail!("{}", message);
        }

        Ok(self
            .model
            .detections
            .iter()
            .filter(|d| d.confidence >= options.confidence_threshold)
            .cloned()
            .collect())
    }
}
