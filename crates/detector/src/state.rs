use crate::backend::DetectionBackend;
use crate::errors::{DetectorError, Result};
use crate::params::{DetectorConfig, ParamUpdate};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `major.minor.patch`; the patch component is bumped on every successful reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub const INITIAL: ModelVersion = ModelVersion {
        major: 1,
        minor: 0,
        patch: 0,
    };

    pub fn bumped(self) -> Self {
        Self {
            patch: self.patch + 1,
            ..self
        }
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub model_path: Option<PathBuf>,
    pub model_version: ModelVersion,
    pub input_size: u32,
}

pub(crate) struct ModelSlot<B> {
    pub(crate) active: B,
    pub(crate) path: Option<PathBuf>,
    pub(crate) version: ModelVersion,
}

pub(crate) struct Inner<B> {
    pub(crate) config: DetectorConfig,
    pub(crate) model: ModelSlot<B>,
}

/// Thresholds plus the active model, behind one lock.
///
/// Detection holds the lock for its whole run, so a request always sees one
/// consistent config and model. Reloads build the candidate model before
/// taking the lock and only swap handles under it.
pub struct DetectorState<B: DetectionBackend> {
    inner: Mutex<Inner<B>>,
    pub(crate) next_id: AtomicU64,
}

impl<B: DetectionBackend> DetectorState<B> {
    /// `model_path` is the path reported and reused by path-less reloads;
    /// pass `None` when `model` came from bundled baseline weights.
    pub fn new(model: B, model_path: Option<PathBuf>, config: DetectorConfig) -> Self {
        tracing::info!(
            confidence_threshold = config.confidence_threshold,
            entropy_threshold = config.entropy_threshold,
            nms_iou_threshold = config.nms_iou_threshold,
            input_size = config.input_size,
            model_path = ?model_path,
            "Detector state initialized"
        );

        Self {
            inner: Mutex::new(Inner {
                config,
                model: ModelSlot {
                    active: model,
                    path: model_path,
                    version: ModelVersion::INITIAL,
                },
            }),
            next_id: AtomicU64::new(0),
        }
    }

    /// Every mutation under this lock is all-or-nothing, so a guard recovered
    /// from a panicked holder still sees consistent state.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner<B>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn params(&self) -> DetectorConfig {
        self.lock().config
    }

    pub fn model_info(&self) -> ModelInfo {
        let inner = self.lock();
        ModelInfo {
            model_path: inner.model.path.clone(),
            model_version: inner.model.version,
            input_size: inner.config.input_size,
        }
    }

    /// Validate and apply a partial update. On error nothing changes.
    pub fn update_params(&self, update: &ParamUpdate) -> Result<DetectorConfig> {
        let mut inner = self.lock();
        let updated = inner.config.apply(update)?;
        let previous = std::mem::replace(&mut inner.config, updated);
        drop(inner);

        tracing::info!(
            previous = ?previous,
            current = ?updated,
            "Detector parameters updated"
        );
        Ok(updated)
    }

    /// Swap in a model loaded from `path`, or from the last loaded path.
    ///
    /// Loading happens outside the lock. If it fails the active model,
    /// path and version are untouched. The retired model is dropped after
    /// the lock is released and is never swapped back.
    pub fn reload_model(&self, path: Option<&Path>) -> Result<ModelVersion> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self
                .lock()
                .model
                .path
                .clone()
                .ok_or(DetectorError::NoModelPath)?,
        };

        tracing::info!(model_path = %path.display(), "Loading candidate model");

        let candidate = B::load_model(&path).map_err(|source| DetectorError::ModelLoad {
            path: path.clone(),
            source,
        })?;

        let (retired, version) = {
            let mut inner = self.lock();
            let retired = std::mem::replace(&mut inner.model.active, candidate);
            inner.model.path = Some(path.clone());
            inner.model.version = inner.model.version.bumped();
            (retired, inner.model.version)
        };
        drop(retired);

        tracing::info!(
            model_path = %path.display(),
            model_version = %version,
            "Model hot-swapped"
        );
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::RawDetection;
    use crate::backend::PredictOptions;
    use image::RgbImage;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DROPPED: AtomicUsize = AtomicUsize::new(0);

    /// Loads from any path not containing "missing"; counts drops.
    struct StubBackend {
        source: PathBuf,
    }

    impl Drop for StubBackend {
        fn drop(&mut self) {
            DROPPED.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl DetectionBackend for StubBackend {
        fn load_model(path: &Path) -> anyhow::Result<Self> {
            if path.to_string_lossy().contains("missing") {
                anyhow::bail!("no such file");
            }
            Ok(Self {
                source: path.to_path_buf(),
            })
        }

        fn predict(
            &mut self,
            _image: &RgbImage,
            _options: &PredictOptions,
        ) -> anyhow::Result<Vec<RawDetection>> {
            Ok(vec![])
        }
    }

    fn state_with_path(path: Option<&str>) -> DetectorState<StubBackend> {
        let model = StubBackend {
            source: PathBuf::from(path.unwrap_or("baseline")),
        };
        DetectorState::new(model, path.map(PathBuf::from), DetectorConfig::default())
    }

    #[test]
    fn test_version_display_and_bump() {
        assert_eq!(ModelVersion::INITIAL.to_string(), "v1.0.0");
        assert_eq!(ModelVersion::INITIAL.bumped().bumped().to_string(), "v1.0.2");
    }

    #[test]
    fn test_reload_swaps_model_and_bumps_version() {
        let state = state_with_path(Some("/models/a.onnx"));
        let version = state.reload_model(Some(Path::new("/models/b.onnx"))).unwrap();

        assert_eq!(version.to_string(), "v1.0.1");
        let info = state.model_info();
        assert_eq!(info.model_path, Some(PathBuf::from("/models/b.onnx")));
        assert_eq!(info.model_version, version);
        assert_eq!(
            state.lock().model.active.source,
            PathBuf::from("/models/b.onnx")
        );
    }

    #[test]
    fn test_reload_without_path_reuses_last_path() {
        let state = state_with_path(Some("/models/a.onnx"));
        let version = state.reload_model(None).unwrap();

        assert_eq!(version.to_string(), "v1.0.1");
        assert_eq!(
            state.model_info().model_path,
            Some(PathBuf::from("/models/a.onnx"))
        );
    }

    #[test]
    fn test_reload_without_any_path_fails() {
        let state = state_with_path(None);
        let result = state.reload_model(None);

        assert!(matches!(result, Err(DetectorError::NoModelPath)));
        assert_eq!(state.model_info().model_version, ModelVersion::INITIAL);
        assert_eq!(state.model_info().model_path, None);
    }

    #[test]
    fn test_failed_load_leaves_state_untouched() {
        let state = state_with_path(Some("/models/a.onnx"));
        let before = state.model_info();

        let result = state.reload_model(Some(Path::new("/models/missing.onnx")));

        assert!(matches!(result, Err(DetectorError::ModelLoad { .. })));
        assert_eq!(state.model_info(), before);
        assert_eq!(
            state.lock().model.active.source,
            PathBuf::from("/models/a.onnx")
        );
    }

    #[test]
    fn test_retired_model_is_dropped() {
        let state = state_with_path(Some("/models/a.onnx"));
        let before = DROPPED.load(Ordering::SeqCst);

        state.reload_model(Some(Path::new("/models/b.onnx"))).unwrap();

        assert!(DROPPED.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn test_update_params_rejects_without_mutation() {
        let state = state_with_path(None);
        let result = state.update_params(&ParamUpdate {
            confidence_threshold: Some(0.7),
            nms_iou_threshold: Some(0.49),
            ..Default::default()
        });

        assert!(matches!(
            result,
            Err(DetectorError::InvalidParameter {
                field: "nms_iou_threshold",
                ..
            })
        ));
        assert_eq!(state.params(), DetectorConfig::default());
    }

    #[test]
    fn test_update_params_applies_all_fields() {
        let state = state_with_path(None);
        let updated = state
            .update_params(&ParamUpdate {
                confidence_threshold: Some(0.25),
                entropy_threshold: Some(0.4),
                nms_iou_threshold: Some(0.6),
                input_size: Some(1280),
            })
            .unwrap();

        assert_eq!(state.params(), updated);
        assert_eq!(updated.input_size, 1280);
        assert_eq!(state.model_info().input_size, 1280);
    }

    #[test]
    fn test_panicked_holder_does_not_wedge_state() {
        let state = Arc::new(state_with_path(Some("/models/a.onnx")));

        let holder = Arc::clone(&state);
        let joined = std::thread::spawn(move || {
            let _guard = holder.lock();
            panic!("backend crashed mid-request");
        })
        .join();
        assert!(joined.is_err());
        assert!(state.inner.is_poisoned());

        assert_eq!(state.params(), DetectorConfig::default());
        state
            .update_params(&ParamUpdate {
                entropy_threshold: Some(0.3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(state.params().entropy_threshold, 0.3);

        let version = state.reload_model(None).unwrap();
        assert_eq!(version.to_string(), "v1.0.1");
    }

    #[test]
    fn test_concurrent_reloads_bump_once_each() {
        let state = Arc::new(state_with_path(Some("/models/a.onnx")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    let path = PathBuf::from(format!("/models/{i}.onnx"));
                    state.reload_model(Some(&path)).unwrap();
                    state.update_params(&ParamUpdate {
                        entropy_threshold: Some(0.1 * (i % 10) as f64),
                        ..Default::default()
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(state.model_info().model_version.patch, 8);
    }
}
