pub mod backend;
pub mod detection;
pub mod errors;
pub mod geometry;
pub mod merge;
pub mod params;
pub mod pipeline;
pub mod processing;
pub mod state;
pub mod uncertainty;

// Re-export commonly used types for convenience
pub use backend::{DetectionBackend, PredictOptions};
pub use detection::{BoundingBox, Detection, RawDetection};
pub use errors::DetectorError;
pub use params::{DetectorConfig, ParamUpdate};
pub use pipeline::DetectOutput;
pub use state::{DetectorState, ModelInfo, ModelVersion};

/// Weights loaded when the service starts without an explicit model path.
pub const DEFAULT_MODEL_PATH: &str = "models/yolo11n.onnx";
