use super::{DetectionBackend, PredictOptions};
use crate::detection::RawDetection;
use crate::params::DEFAULT_INPUT_SIZE;
use crate::processing::{
    post::{PostProcessor, parse_class_names},
    pre::PreProcessor,
};
use image::RgbImage;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";

#[derive(Debug, Clone, Copy)]
pub enum ExecutionProvider {
    Cpu,
    #[cfg(feature = "cuda")]
    Cuda,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        #[cfg(feature = "cuda")]
        return ExecutionProvider::Cuda;
        #[cfg(not(feature = "cuda"))]
        return ExecutionProvider::Cpu;
    }
}

/// YOLO detector exported to ONNX, run through ONNX Runtime.
pub struct OrtBackend {
    session: Session,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
}

impl OrtBackend {
    pub fn load_model_with_provider(
        path: &Path,
        provider: ExecutionProvider,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[allow(unused_mut)]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        let class_names = session
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names"))
            .map(|raw| parse_class_names(&raw))
            .unwrap_or_default();

        tracing::info!(
            model_path = %path.display(),
            classes = class_names.len(),
            "Model loaded"
        );

        Ok(Self {
            session,
            preprocessor: PreProcessor::new(DEFAULT_INPUT_SIZE),
            postprocessor: PostProcessor::new(class_names),
        })
    }
}

impl DetectionBackend for OrtBackend {
    fn load_model(path: &Path) -> anyhow::Result<Self> {
        Self::load_model_with_provider(path, ExecutionProvider::default())
    }

    fn predict(
        &mut self,
        image: &RgbImage,
        options: &PredictOptions,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let (input, letterbox) = self.preprocessor.preprocess(image, options.input_size)?;

        let _infer_span = tracing::info_span!("model_inference").entered();
        let outputs = self.session.run(ort::inputs![
            INPUT_NAME => TensorRef::from_array_view(input.view())?
        ])?;
        let output = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;

        self.postprocessor.parse_detections(
            &output,
            &letterbox,
            image.width(),
            image.height(),
            options.confidence_threshold,
            options.iou_threshold,
        )
    }
}
