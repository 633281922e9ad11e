use crate::api::{
    CurrentParams, DetectRequest, DetectResponse, DetectionResult, ModelInfoResponse,
    ReloadModelRequest, ReloadModelResponse, UpdateParamsRequest, UpdateParamsResponse,
};
use crate::metrics::{Outcome, ServiceMetrics};
use detector::{DetectionBackend, DetectorError, DetectorState, ParamUpdate};
use std::path::Path;
use std::sync::Arc;

/// Maps RPC requests onto the detector state. Every domain failure comes back
/// as a response value; nothing here returns a transport error.
///
/// Methods block (detection holds the detector lock for the whole run), so
/// callers on an async runtime should go through `spawn_blocking`.
pub struct DetectionService<B: DetectionBackend> {
    state: Arc<DetectorState<B>>,
    metrics: ServiceMetrics,
}

impl<B: DetectionBackend> Clone for DetectionService<B> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            metrics: self.metrics.clone(),
        }
    }
}

impl<B: DetectionBackend> DetectionService<B> {
    pub fn new(state: DetectorState<B>) -> Self {
        Self {
            state: Arc::new(state),
            metrics: ServiceMetrics::new(),
        }
    }

    pub fn detect(&self, request: DetectRequest) -> DetectResponse {
        let frame_id = request.frame_id;
        let _s = common::span!("detect", frame_id = frame_id);

        match self.state.detect(&request.image_data, &request.image_format) {
            Ok(output) => {
                let uncertain = output.detections.iter().filter(|d| d.is_uncertain).count();
                self.metrics.record_detect(
                    output.elapsed,
                    output.detections.len() as u64,
                    uncertain as u64,
                );

                tracing::debug!(
                    frame_id,
                    detections = output.detections.len(),
                    uncertain,
                    elapsed_ms = output.elapsed.as_millis() as u64,
                    "Frame processed"
                );

                DetectResponse {
                    frame_id,
                    inference_time_ms: output.elapsed.as_millis() as i64,
                    results: output
                        .detections
                        .into_iter()
                        .map(DetectionResult::from)
                        .collect(),
                    error: None,
                }
            }
            Err(e) => self.detect_failed(frame_id, &e),
        }
    }

    /// Response for a Detect request that produced no detections because of
    /// an error. The caller's frame id is always echoed.
    pub fn detect_failed(&self, frame_id: i64, error: &dyn std::fmt::Display) -> DetectResponse {
        self.metrics.record_detect_failure();
        tracing::error!(frame_id, error = %error, "Detection failed");
        DetectResponse::failed(frame_id, error.to_string())
    }

    pub fn reload_model(&self, request: ReloadModelRequest) -> ReloadModelResponse {
        let requested = request.model_path.filter(|p| !p.is_empty());
        let _s = common::span!("reload_model");

        match self.state.reload_model(requested.as_deref().map(Path::new)) {
            Ok(version) => {
                self.metrics.record_reload(Outcome::Success);
                ReloadModelResponse {
                    success: true,
                    message: format!("Model reloaded as {version}"),
                    model_version: version.to_string(),
                }
            }
            Err(e) => self.reload_failed(requested.as_deref(), &e),
        }
    }

    /// Failure response carrying the version that stays active.
    pub fn reload_failed(
        &self,
        requested: Option<&str>,
        error: &dyn std::fmt::Display,
    ) -> ReloadModelResponse {
        self.metrics.record_reload(Outcome::Failure);
        let active = self.state.model_info().model_version;
        tracing::error!(
            requested_path = ?requested,
            model_version = %active,
            error = %error,
            "Model reload failed, keeping active model"
        );

        ReloadModelResponse {
            success: false,
            message: error.to_string(),
            model_version: active.to_string(),
        }
    }

    pub fn update_params(&self, request: UpdateParamsRequest) -> UpdateParamsResponse {
        let update = ParamUpdate {
            confidence_threshold: request.confidence_threshold,
            entropy_threshold: request.entropy_threshold,
            nms_iou_threshold: request.nms_iou_threshold,
            input_size: request.input_size,
        };

        if update.is_empty() {
            return UpdateParamsResponse {
                success: true,
                message: "Parameters unchanged".to_string(),
                current: self.params(),
            };
        }

        match self.state.update_params(&update) {
            Ok(current) => {
                self.metrics.record_param_update(Outcome::Success);
                UpdateParamsResponse {
                    success: true,
                    message: "Parameters updated".to_string(),
                    current: current.into(),
                }
            }
            Err(e) => {
                if let DetectorError::InvalidParameter { field, .. } = &e {
                    tracing::warn!(field, error = %e, "Rejected parameter update");
                } else {
                    tracing::error!(error = %e, "Parameter update failed");
                }
                self.update_failed(&e)
            }
        }
    }

    /// Failure response carrying the unchanged parameter snapshot.
    pub fn update_failed(&self, error: &dyn std::fmt::Display) -> UpdateParamsResponse {
        self.metrics.record_param_update(Outcome::Failure);
        UpdateParamsResponse {
            success: false,
            message: error.to_string(),
            current: self.params(),
        }
    }

    pub fn params(&self) -> CurrentParams {
        self.state.params().into()
    }

    pub fn model_info(&self) -> ModelInfoResponse {
        self.state.model_info().into()
    }
}
