//! Logging, tracing export and metrics for the server.
//!
//! Console logging through `tracing-subscriber` is always on. `RUST_LOG`
//! filters it (default `info`) and `LOG_FORMAT=json` switches from the pretty
//! multi-line format to one JSON object per line.
//!
//! OpenTelemetry export is opt-in through cargo features:
//!
//! - `tracing`: export spans. Events inside a span become span events.
//! - `metrics`: export the pool counters defined at the bottom of this file.
//! - `stdout`: print exported data to stdout every 5s.
//! - `honeycomb`: ship exported data over OTLP/gRPC. Reads
//!   `HONEYCOMB_API_KEY`, `HONEYCOMB_DATASET`, `HONEYCOMB_ENDPOINT` and
//!   `HONEYCOMB_COMPRESSION` at startup.
//!
//! Exporters need at least one of `tracing` or `metrics`:
//!
//! ```bash
//! cargo run --features tracing,metrics,stdout
//! ```

#[cfg(all(
    any(feature = "honeycomb", feature = "stdout"),
    not(any(feature = "tracing", feature = "metrics"))
))]
compile_error!(
    "The 'honeycomb' and 'stdout' exporters require 'tracing' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "honeycomb")]
use opentelemetry_otlp::{Compression, Protocol, WithExportConfig, WithTonicConfig};
#[cfg(all(feature = "honeycomb", feature = "metrics"))]
use opentelemetry_sdk::metrics::Temporality;
#[cfg(feature = "honeycomb")]
use tonic::{metadata::MetadataMap, transport::ClientTlsConfig};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};

#[cfg(any(feature = "stdout", all(feature = "honeycomb", feature = "tracing")))]
const EXPORT_INTERVAL: core::time::Duration = core::time::Duration::from_secs(5);

#[cfg(any(feature = "metrics", feature = "tracing"))]
const SERVICE_NAME: &str = "keygen";

/// Handles to the OpenTelemetry providers. Empty unless `tracing` or
/// `metrics` is enabled.
pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes pending spans and metrics and stops the exporters.
    ///
    /// Runs after the subscriber may already be torn down, so failures go to
    /// stderr.
    pub fn shutdown(&self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber and, when enabled, the OpenTelemetry
/// providers. Call once, before anything logs.
pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(json.then(|| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
        }))
        .with((!json).then(|| {
            fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty()
        }));

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let exporters = Exporters::from_env()?;

    #[cfg(feature = "tracing")]
    let (registry, tracer_provider) = {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let provider = init_tracer(&exporters)?;
        opentelemetry::global::set_tracer_provider(provider.clone());
        let layer = tracing_opentelemetry::layer()
            .with_tracer(provider.tracer_with_scope(scope.clone()))
            .with_error_records_to_exceptions(true);
        (registry.with(layer), provider)
    };

    #[cfg(feature = "metrics")]
    let (registry, meter_provider) = {
        let provider = init_metrics(&exporters)?;
        opentelemetry::global::set_meter_provider(provider.clone());
        init_metric_handles(opentelemetry::global::meter_with_scope(scope));
        let layer = tracing_opentelemetry::MetricsLayer::new(provider.clone());
        (registry.with(layer), provider)
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

/// Exporter settings shared by the tracer and meter providers.
#[cfg(any(feature = "metrics", feature = "tracing"))]
struct Exporters {
    #[cfg(feature = "honeycomb")]
    honeycomb: HoneycombSettings,
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
impl Exporters {
    // Only fallible with `honeycomb`.
    #[allow(clippy::unnecessary_wraps)]
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(feature = "honeycomb")]
            honeycomb: HoneycombSettings::from_env()?,
        })
    }
}

#[cfg(feature = "honeycomb")]
struct HoneycombSettings {
    metadata: MetadataMap,
    endpoint: String,
    compression: Compression,
}

#[cfg(feature = "honeycomb")]
impl HoneycombSettings {
    fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;
        use core::str::FromStr;

        let var = |name: &str| std::env::var(name).with_context(|| format!("missing `{name}`"));

        let mut metadata = MetadataMap::new();
        metadata.insert(
            "x-honeycomb-team",
            var("HONEYCOMB_API_KEY")?
                .parse()
                .context("invalid API key")?,
        );
        metadata.insert(
            "x-honeycomb-dataset",
            var("HONEYCOMB_DATASET")?
                .parse()
                .context("invalid dataset")?,
        );

        Ok(Self {
            metadata,
            endpoint: var("HONEYCOMB_ENDPOINT")?,
            compression: Compression::from_str(&var("HONEYCOMB_COMPRESSION")?.to_ascii_lowercase())?,
        })
    }

    fn tls() -> ClientTlsConfig {
        ClientTlsConfig::new().with_native_roots()
    }
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
#[allow(unused_variables)]
fn init_metrics(exporters: &Exporters) -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_reader(
        sdkmetrics::PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
            .with_interval(EXPORT_INTERVAL)
            .build(),
    );

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let honeycomb = &exporters.honeycomb;
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_tls_config(HoneycombSettings::tls())
            .with_metadata(honeycomb.metadata.clone())
            .with_timeout(core::time::Duration::from_secs(10))
            .with_compression(honeycomb.compression)
            .with_endpoint(honeycomb.endpoint.clone())
            .with_protocol(Protocol::Grpc)
            .with_temporality(Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;

        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "tracing")]
#[allow(unused_variables)]
fn init_tracer(exporters: &Exporters) -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_span_processor(batch(opentelemetry_stdout::SpanExporter::default()));

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let honeycomb = &exporters.honeycomb;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_tls_config(HoneycombSettings::tls())
            .with_metadata(honeycomb.metadata.clone())
            .with_timeout(core::time::Duration::from_secs(10))
            .with_compression(honeycomb.compression)
            .with_endpoint(honeycomb.endpoint.clone())
            .with_protocol(Protocol::Grpc)
            .build()
            .context("failed to build tracer exporter")?;

        builder.with_span_processor(batch(exporter))
    };

    Ok(builder.build())
}

#[cfg(all(feature = "tracing", any(feature = "stdout", feature = "honeycomb")))]
fn batch<E>(exporter: E) -> sdktrace::BatchSpanProcessor
where
    E: opentelemetry_sdk::trace::SpanExporter + 'static,
{
    sdktrace::BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            sdktrace::BatchConfigBuilder::default()
                .with_scheduled_delay(EXPORT_INTERVAL)
                .with_max_queue_size(2048)
                .build(),
        )
        .build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static KEYS_ALLOCATED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static KEYS_RELEASED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static KEYS_GENERATED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REQUEST_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static GENERATOR_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = KEYS_ALLOCATED.set(
        meter
            .u64_counter("keys_allocated")
            .with_description("Keys handed out by GetKey")
            .build(),
    );

    let _ = KEYS_RELEASED.set(
        meter
            .u64_counter("keys_released")
            .with_description("Keys returned by ReleaseKey")
            .build(),
    );

    let _ = KEYS_GENERATED.set(
        meter
            .u64_counter("keys_generated")
            .with_description("Keys added to the pool by the replenisher")
            .build(),
    );

    let _ = REQUEST_ERRORS.set(
        meter
            .u64_counter("request_errors")
            .with_description("Failed GetKey/ReleaseKey calls")
            .build(),
    );

    let _ = GENERATOR_ERRORS.set(
        meter
            .u64_counter("generator_errors")
            .with_description("Failed replenishment steps, collisions included")
            .build(),
    );
}

#[cfg(feature = "metrics")]
fn add(counter: &OnceLock<Counter<u64>>, rpc: Option<&'static str>) {
    if let Some(counter) = counter.get() {
        match rpc {
            Some(rpc) => counter.add(1, &[KeyValue::new("rpc", rpc)]),
            None => counter.add(1, &[]),
        }
    }
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_keys_allocated() {
    add(&KEYS_ALLOCATED, None);
}

#[cfg(not(feature = "metrics"))]
pub fn increment_keys_allocated() {}

#[cfg(feature = "metrics")]
pub fn increment_keys_released() {
    add(&KEYS_RELEASED, None);
}

#[cfg(not(feature = "metrics"))]
pub fn increment_keys_released() {}

#[cfg(feature = "metrics")]
pub fn increment_keys_generated() {
    add(&KEYS_GENERATED, None);
}

#[cfg(not(feature = "metrics"))]
pub fn increment_keys_generated() {}

/// `rpc` is the method name, recorded as an attribute.
#[cfg(feature = "metrics")]
pub fn increment_request_errors(rpc: &'static str) {
    add(&REQUEST_ERRORS, Some(rpc));
}

#[cfg(not(feature = "metrics"))]
pub fn increment_request_errors(_rpc: &'static str) {}

#[cfg(feature = "metrics")]
pub fn increment_generator_errors() {
    add(&GENERATOR_ERRORS, None);
}

#[cfg(not(feature = "metrics"))]
pub fn increment_generator_errors() {}
