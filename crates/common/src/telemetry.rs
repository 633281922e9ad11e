use crate::Environment;
use crate::logging::{log_filter, output_layer};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Keeps OTLP export of spans and metrics alive; both are flushed on drop.
///
/// Creating one also installs the global log subscriber.
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Export to the OTLP/gRPC collector at `endpoint`.
    ///
    /// The tonic exporters spawn onto the current tokio runtime, so call this
    /// with a runtime entered.
    pub fn init(
        service_name: &str,
        endpoint: &str,
        environment: Environment,
    ) -> anyhow::Result<Self> {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let resource = service_resource(service_name, environment);
        let tracer_provider = tracer_provider(endpoint, resource.clone())?;
        let meter_provider = meter_provider(endpoint, resource)?;
        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        tracing_subscriber::registry()
            .with(output_layer(environment))
            .with(log_filter())
            .with(
                tracing_opentelemetry::layer()
                    .with_tracer(global::tracer(service_name.to_string())),
            )
            .init();

        tracing::info!(
            service_name,
            endpoint,
            environment = environment.as_str(),
            "Exporting traces and metrics"
        );

        Ok(Self {
            tracer_provider,
            meter_provider,
        })
    }
}

// Requests arriving with a sampled parent stay sampled; roots are always kept.
fn tracer_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_batch_exporter(exporter)
        .build())
}

fn meter_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

fn service_resource(service_name: &str, environment: Environment) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, service_name.to_string()),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            KeyValue::new("deployment.environment", environment.as_str()),
        ])
        .build()
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // The subscriber may already be gone during teardown.
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("span export flush failed: {e:?}");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("metric export flush failed: {e:?}");
        }
    }
}

/// Enter an info-level span for the rest of the scope; extra arguments are
/// span fields.
#[macro_export]
macro_rules! span {
    ($name:literal $(, $($field:tt)*)?) => {
        tracing::info_span!($name $(, $($field)*)?).entered()
    };
}

/// Debug-level counterpart of [`span!`].
#[macro_export]
macro_rules! span_debug {
    ($name:literal $(, $($field:tt)*)?) => {
        tracing::debug_span!($name $(, $($field)*)?).entered()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_carries_service_identity() {
        let resource = service_resource("detector-server", Environment::Production);

        let get = |key: &'static str| resource.get(&opentelemetry::Key::from_static_str(key));
        assert_eq!(get(SERVICE_NAME).map(|v| v.to_string()), Some("detector-server".into()));
        assert_eq!(
            get("deployment.environment").map(|v| v.to_string()),
            Some("production".into())
        );
    }
}
