use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("{field} must be {range}, got {value}")]
    InvalidParameter {
        field: &'static str,
        range: &'static str,
        value: String,
    },

    #[error("No model path given and no model path loaded previously")]
    NoModelPath,

    #[error("Failed to load model from {path}: {source:#}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Inference failed: {0:#}")]
    Inference(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DetectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = DetectorError::InvalidParameter {
            field: "nms_iou_threshold",
            range: "between 0.5 and 1.0",
            value: "0.49".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "nms_iou_threshold must be between 0.5 and 1.0, got 0.49"
        );

        assert_eq!(
            DetectorError::NoModelPath.to_string(),
            "No model path given and no model path loaded previously"
        );

        let err = DetectorError::ModelLoad {
            path: PathBuf::from("/models/missing.onnx"),
            source: anyhow::anyhow!("file not found"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load model from /models/missing.onnx: file not found"
        );
    }

    #[test]
    fn test_inference_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("shape mismatch").context("running session");
        let err = DetectorError::Inference(inner);
        assert_eq!(
            err.to_string(),
            "Inference failed: running session: shape mismatch"
        );
    }
}
