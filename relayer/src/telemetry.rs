//! Tracing setup.
//!
//! Without the `telemetry` feature this installs a plain `tracing-subscriber`
//! env-filter layer. With it, and when `OTEL_EXPORTER_OTLP_ENDPOINT` (or a sibling
//! `OTEL_*` var) is set, spans are also exported via OTLP. There is no metrics
//! backend here since this relayer has no HTTP surface to instrument and `spec.md`
//! §4.8 calls for a logged stats snapshot instead.

#[cfg(feature = "telemetry")]
use opentelemetry::{trace::TracerProvider as _, KeyValue};
#[cfg(feature = "telemetry")]
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
    Resource,
};
#[cfg(feature = "telemetry")]
use opentelemetry_semantic_conventions::{attribute::SERVICE_VERSION, SCHEMA_URL};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Holds the tracer provider so it can be flushed on `Drop`.
pub struct Telemetry {
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    pub fn init() -> Self {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        #[cfg(feature = "telemetry")]
        {
            if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .build()
                    .expect("failed to build OTLP span exporter");
                let resource = Resource::builder()
                    .with_service_name(env!("CARGO_PKG_NAME"))
                    .with_schema_url([KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION"))], SCHEMA_URL)
                    .build();
                let tracer_provider = SdkTracerProvider::builder()
                    .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(1.0))))
                    .with_id_generator(RandomIdGenerator::default())
                    .with_resource(resource)
                    .with_batch_exporter(exporter)
                    .build();
                let tracer = tracer_provider.tracer("relayer");

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer())
                    .with(tracing_opentelemetry::OpenTelemetryLayer::new(tracer))
                    .init();

                tracing::info!("OTLP trace export enabled");
                return Self {
                    tracer_provider: Some(tracer_provider),
                };
            }
        }

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();

        #[cfg(feature = "telemetry")]
        return Self { tracer_provider: None };
        #[cfg(not(feature = "telemetry"))]
        Self {}
    }
}

#[cfg(feature = "telemetry")]
impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.as_ref() {
            if let Err(err) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {err:?}");
            }
        }
    }
}
