use clap::Parser;
use common::Environment;
use detector::{DetectorConfig, DetectorError, ParamUpdate};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Startup configuration. Every flag can also come from its environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "detector-server", about = "Livestock object-detection service")]
pub struct ServerConfig {
    #[arg(long, env = "DETECTOR_PORT", default_value_t = 50051)]
    pub port: u16,

    /// Requests processed in parallel; further requests queue
    #[arg(
        long,
        env = "DETECTOR_WORKERS",
        default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub workers: u16,

    /// Model weights; the bundled baseline is used when omitted
    #[arg(long = "model", env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Seconds in-flight requests get to finish after SIGINT/SIGTERM
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "OTEL_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: Environment,

    #[arg(long, env = "CONFIDENCE_THRESHOLD")]
    pub confidence_threshold: Option<f64>,

    #[arg(long, env = "ENTROPY_THRESHOLD")]
    pub entropy_threshold: Option<f64>,

    #[arg(long, env = "NMS_IOU_THRESHOLD")]
    pub nms_iou_threshold: Option<f64>,

    #[arg(long, env = "INPUT_SIZE")]
    pub input_size: Option<u32>,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn workers(&self) -> usize {
        self.workers as usize
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Initial thresholds, validated like a runtime parameter update.
    pub fn detector_config(&self) -> Result<DetectorConfig, DetectorError> {
        DetectorConfig::default().apply(&ParamUpdate {
            confidence_threshold: self.confidence_threshold,
            entropy_threshold: self.entropy_threshold,
            nms_iou_threshold: self.nms_iou_threshold,
            input_size: self.input_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ServerConfig, clap::Error> {
        ServerConfig::try_parse_from(std::iter::once("detector-server").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--port",
            "6000",
            "--workers",
            "2",
            "--model",
            "/models/herd.onnx",
            "--environment",
            "production",
        ])
        .unwrap();

        assert_eq!(config.listen_addr().port(), 6000);
        assert_eq!(config.workers(), 2);
        assert_eq!(config.model_path, Some(PathBuf::from("/models/herd.onnx")));
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(parse(&["--workers", "0"]).is_err());
    }

    #[test]
    fn test_initial_thresholds_validated() {
        let config = parse(&["--nms-iou-threshold", "0.6", "--input-size", "1280"]).unwrap();
        let detector = config.detector_config().unwrap();
        assert_eq!(detector.nms_iou_threshold, 0.6);
        assert_eq!(detector.input_size, 1280);
        assert_eq!(detector.confidence_threshold, 0.5);

        let config = parse(&["--input-size", "512"]).unwrap();
        assert!(config.detector_config().is_err());
    }

    #[test]
    fn test_unknown_environment_rejected() {
        assert!(parse(&["--environment", "staging"]).is_err());
    }
}
