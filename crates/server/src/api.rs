//! JSON wire types of the RPC surface.

use detector::{DetectorConfig, ModelInfo};
use serde::{Deserialize, Serialize};

/// Largest raw image accepted by Detect.
pub const MAX_IMAGE_BYTES: usize = 100 * 1024 * 1024;

/// Body limit: base64 expansion of [`MAX_IMAGE_BYTES`] plus room for the envelope.
pub const MAX_REQUEST_BODY_BYTES: usize = MAX_IMAGE_BYTES.div_ceil(3) * 4 + 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    pub frame_id: i64,
    #[serde(with = "base64_bytes")]
    pub image_data: Vec<u8>,
    #[serde(default)]
    pub image_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub id: u64,
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f32,
    pub entropy: f32,
    pub is_uncertain: bool,
}

impl From<detector::Detection> for DetectionResult {
    fn from(d: detector::Detection) -> Self {
        Self {
            id: d.id,
            bbox: BoundingBox {
                x1: d.bbox.x1,
                y1: d.bbox.y1,
                x2: d.bbox.x2,
                y2: d.bbox.y2,
            },
            class_id: d.class_id,
            class_name: d.class_name,
            confidence: d.confidence,
            entropy: d.entropy,
            is_uncertain: d.is_uncertain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    pub frame_id: i64,
    pub inference_time_ms: i64,
    pub results: Vec<DetectionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectResponse {
    pub fn failed(frame_id: i64, error: impl Into<String>) -> Self {
        Self {
            frame_id,
            inference_time_ms: 0,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReloadModelRequest {
    /// Absent or empty reloads from the last loaded path.
    #[serde(default)]
    pub model_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadModelResponse {
    pub success: bool,
    pub message: String,
    pub model_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateParamsRequest {
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub entropy_threshold: Option<f64>,
    #[serde(default)]
    pub nms_iou_threshold: Option<f64>,
    #[serde(default)]
    pub input_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentParams {
    pub confidence_threshold: f64,
    pub entropy_threshold: f64,
    pub nms_iou_threshold: f64,
    pub input_size: u32,
}

impl From<DetectorConfig> for CurrentParams {
    fn from(c: DetectorConfig) -> Self {
        Self {
            confidence_threshold: c.confidence_threshold,
            entropy_threshold: c.entropy_threshold,
            nms_iou_threshold: c.nms_iou_threshold,
            input_size: c.input_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateParamsResponse {
    pub success: bool,
    pub message: String,
    pub current: CurrentParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub model_path: Option<String>,
    pub model_version: String,
    pub input_size: u32,
}

impl From<ModelInfo> for ModelInfoResponse {
    fn from(info: ModelInfo) -> Self {
        Self {
            model_path: info.model_path.map(|p| p.display().to_string()),
            model_version: info.model_version.to_string(),
            input_size: info.input_size,
        }
    }
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}
