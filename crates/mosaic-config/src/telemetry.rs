use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

/// `[telemetry]` section
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Attributes attached to every exported span and metric
    #[serde(default)]
    pub resource_attributes: HashMap<String, String>,
    /// `EnvFilter` directive, e.g. `info,mosaic_fanout=debug`
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Collector receiving both traces and metrics; logging only when absent
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
    /// Fraction of root traces kept, clamped to `[0, 1]`
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Seconds between metric pushes
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub endpoint: Url,
    #[serde(default)]
    pub protocol: ExportProtocol,
}

/// Wire protocol spoken to the collector
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportProtocol {
    #[default]
    Grpc,
    HttpProto,
}

fn default_service_name() -> String {
    "mosaic".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_sampling_rate() -> f64 {
    1.0
}

#[allow(clippy::missing_const_for_fn)]
fn default_metrics_interval() -> u64 {
    15
}
