use crate::errors::{DetectorError, Result};
use serde::{Deserialize, Serialize};

pub const SUPPORTED_INPUT_SIZES: [u32; 3] = [320, 640, 1280];

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 0.5;
pub const DEFAULT_NMS_IOU_THRESHOLD: f64 = 0.8;
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Tunable thresholds read by every detection request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub confidence_threshold: f64,
    pub entropy_threshold: f64,
    pub nms_iou_threshold: f64,
    pub input_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            entropy_threshold: DEFAULT_ENTROPY_THRESHOLD,
            nms_iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

/// A partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamUpdate {
    pub confidence_threshold: Option<f64>,
    pub entropy_threshold: Option<f64>,
    pub nms_iou_threshold: Option<f64>,
    pub input_size: Option<u32>,
}

impl ParamUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl DetectorConfig {
    /// Validate every supplied field, then return the updated config.
    ///
    /// Fields are checked in declaration order and the first invalid one is
    /// reported. `self` is never modified, so a failed update has no effect.
    pub fn apply(&self, update: &ParamUpdate) -> Result<DetectorConfig> {
        if let Some(v) = update.confidence_threshold {
            check_unit_range("confidence_threshold", v)?;
        }
        if let Some(v) = update.entropy_threshold {
            check_unit_range("entropy_threshold", v)?;
        }
        if let Some(v) = update.nms_iou_threshold {
            if !(0.5..=1.0).contains(&v) {
                return Err(DetectorError::InvalidParameter {
                    field: "nms_iou_threshold",
                    range: "between 0.5 and 1.0",
                    value: v.to_string(),
                });
            }
        }
        if let Some(v) = update.input_size {
            if !SUPPORTED_INPUT_SIZES.contains(&v) {
                return Err(DetectorError::InvalidParameter {
                    field: "input_size",
                    range: "one of 320, 640 or 1280",
                    value: v.to_string(),
                });
            }
        }

        Ok(DetectorConfig {
            confidence_threshold: update
                .confidence_threshold
                .unwrap_or(self.confidence_threshold),
            entropy_threshold: update.entropy_threshold.unwrap_or(self.entropy_threshold),
            nms_iou_threshold: update.nms_iou_threshold.unwrap_or(self.nms_iou_threshold),
            input_size: update.input_size.unwrap_or(self.input_size),
        })
    }
}

fn check_unit_range(field: &'static str, value: f64) -> Result<()> {
    // NaN fails `contains`
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DetectorError::InvalidParameter {
            field,
            range: "between 0.0 and 1.0",
            value: value.to_string(),
        })
    }
}
