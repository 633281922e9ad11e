use anyhow::Context;
use clap::Parser;
use common::TelemetryGuard;
use detector::{DEFAULT_MODEL_PATH, DetectionBackend, DetectorState};
use server::{
    DetectionService, SERVICE_NAME, ServerConfig, logging::setup_logging, serve_with_shutdown,
    shutdown_signal,
};
use std::path::PathBuf;

#[cfg(feature = "ort-backend")]
type Backend = detector::backend::ort::OrtBackend;

#[cfg(all(feature = "fixture-backend", not(feature = "ort-backend")))]
type Backend = detector::backend::fixture::FixtureBackend;

#[cfg(not(any(feature = "ort-backend", feature = "fixture-backend")))]
compile_error!("detector-server needs the `ort-backend` or `fixture-backend` feature");

fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers())
        .max_blocking_threads(config.workers())
        .thread_name("detector-worker")
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let telemetry = match &config.otel_endpoint {
        Some(endpoint) => {
            let _rt = runtime.enter();
            Some(
                TelemetryGuard::init(SERVICE_NAME, endpoint, config.environment)
                    .context("failed to initialize telemetry")?,
            )
        }
        None => {
            setup_logging(&config);
            None
        }
    };

    let grace = config.shutdown_grace();
    let result = runtime.block_on(run(config));
    if let Err(e) = &result {
        tracing::error!(error = ?e, "Detector server failed");
    }

    if let Some(guard) = telemetry {
        let _rt = runtime.enter();
        drop(guard);
    }
    runtime.shutdown_timeout(grace);

    result
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let detector_config = config
        .detector_config()
        .context("invalid initial detector parameters")?;

    let load_path = config
        .model_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));
    tracing::info!(model_path = %load_path.display(), "Loading model");

    let model = tokio::task::spawn_blocking(move || Backend::load_model(&load_path))
        .await?
        .context("failed to load initial model")?;

    let state = DetectorState::new(model, config.model_path.clone(), detector_config);
    let service = DetectionService::new(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;

    tracing::info!(
        addr = %config.listen_addr(),
        workers = config.workers(),
        environment = config.environment.as_str(),
        "Detector server listening"
    );

    serve_with_shutdown(listener, service, shutdown_signal(), config.shutdown_grace()).await
}
