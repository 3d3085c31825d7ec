//! Telemetry for Mosaic
//!
//! Structured logging through `tracing`, with optional OTLP export of
//! traces and branch metrics

mod metadata;
pub mod metrics;

use std::time::Duration;

use mosaic_config::TelemetryConfig;
use mosaic_config::telemetry::{ExportProtocol, ExporterConfig};
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps exporters alive; dropping it flushes and stops them
#[derive(Default)]
pub struct TelemetryGuard {
    meters: Option<SdkMeterProvider>,
    tracers: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Push buffered metrics now instead of waiting for the next interval
    pub fn force_flush(&self) -> anyhow::Result<()> {
        if let Some(meters) = &self.meters {
            meters
                .force_flush()
                .map_err(|e| anyhow::anyhow!("metric flush failed: {e}"))?;
        }
        Ok(())
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // The subscriber may already be gone at this point
        if let Some(meters) = self.meters.take()
            && let Err(e) = meters.shutdown()
        {
            eprintln!("metric exporter shutdown failed: {e}");
        }
        if let Some(tracers) = self.tracers.take()
            && let Err(e) = tracers.shutdown()
        {
            eprintln!("span exporter shutdown failed: {e}");
        }
    }
}

/// Install the global subscriber, plus OTLP export when configured
///
/// The filter comes from `RUST_LOG`, then `telemetry.log_filter`, then
/// `default_filter`. Hold the guard until the process exits.
///
/// # Errors
///
/// Returns an error if an OTLP exporter cannot be built
pub fn init(config: Option<&TelemetryConfig>, default_filter: &str) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.and_then(|c| c.log_filter.as_deref()).unwrap_or(default_filter)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt = tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false);
    let registry = tracing_subscriber::registry().with(filter).with(fmt);

    let Some((config, exporter)) = config.and_then(|c| Some((c, c.exporter.as_ref()?))) else {
        registry.init();
        return Ok(TelemetryGuard::default());
    };

    let resource = metadata::build_resource(config);
    let meters = meter_provider(config, exporter, resource.clone())?;
    let tracers = tracer_provider(config, exporter, resource)?;

    global::set_meter_provider(meters.clone());
    global::set_tracer_provider(tracers.clone());

    registry
        .with(tracing_opentelemetry::layer().with_tracer(tracers.tracer("mosaic")))
        .init();

    tracing::debug!(endpoint = %exporter.endpoint, "otlp export enabled");

    Ok(TelemetryGuard {
        meters: Some(meters),
        tracers: Some(tracers),
    })
}

fn meter_provider(
    config: &TelemetryConfig,
    exporter: &ExporterConfig,
    resource: Resource,
) -> anyhow::Result<SdkMeterProvider> {
    use opentelemetry_otlp::MetricExporter;
    use opentelemetry_sdk::metrics::PeriodicReader;

    let endpoint = exporter.endpoint.as_str();
    let built = match exporter.protocol {
        ExportProtocol::Grpc => MetricExporter::builder().with_tonic().with_endpoint(endpoint).build(),
        ExportProtocol::HttpProto => MetricExporter::builder().with_http().with_endpoint(endpoint).build(),
    };
    let metric_exporter = built.map_err(|e| anyhow::anyhow!("cannot build OTLP metric exporter: {e}"))?;

    let reader = PeriodicReader::builder(metric_exporter)
        .with_interval(Duration::from_secs(config.metrics_interval.max(1)))
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

fn tracer_provider(
    config: &TelemetryConfig,
    exporter: &ExporterConfig,
    resource: Resource,
) -> anyhow::Result<SdkTracerProvider> {
    use opentelemetry_otlp::SpanExporter;

    let endpoint = exporter.endpoint.as_str();
    let built = match exporter.protocol {
        ExportProtocol::Grpc => SpanExporter::builder().with_tonic().with_endpoint(endpoint).build(),
        ExportProtocol::HttpProto => SpanExporter::builder().with_http().with_endpoint(endpoint).build(),
    };
    let span_exporter = built.map_err(|e| anyhow::anyhow!("cannot build OTLP span exporter: {e}"))?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(sampler(config.sampling_rate))))
        .with_batch_exporter(span_exporter)
        .build())
}

fn sampler(rate: f64) -> Sampler {
    match rate {
        r if r >= 1.0 => Sampler::AlwaysOn,
        r if r <= 0.0 => Sampler::AlwaysOff,
        r => Sampler::TraceIdRatioBased(r),
    }
}
