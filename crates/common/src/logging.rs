use crate::config::Environment;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

/// Applied when `RUST_LOG` is unset or unparsable. ONNX Runtime and the
/// HTTP/2 stack are noisy at info.
pub const DEFAULT_LOG_FILTER: &str = "info,ort=warn,h2=warn,hyper=warn,tonic=warn";

pub(crate) fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// JSON lines in production, human-readable output in development.
pub(crate) fn output_layer<S>(environment: Environment) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match environment {
        Environment::Production => fmt::layer().json().with_level(true).boxed(),
        Environment::Development => fmt::layer().pretty().with_ansi(true).boxed(),
    }
}

/// Install the global subscriber for a process that does not export telemetry.
///
/// Spans still flow through an OpenTelemetry layer so trace context read from
/// request headers is carried, but nothing leaves the process. Mutually
/// exclusive with [`crate::TelemetryGuard::init`].
pub fn setup_logging(environment: Environment) {
    tracing_subscriber::registry()
        .with(output_layer(environment))
        .with(log_filter())
        .with(tracing_opentelemetry::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        assert!(filter.to_string().contains("ort=warn"));
    }
}
