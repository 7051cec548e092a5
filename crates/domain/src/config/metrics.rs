use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Optional JSON snapshot written every report interval.
    #[serde(default)]
    pub file: Option<String>,

    /// Seconds between snapshot writes (1..=3600).
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,

    /// `host:port` for the Prometheus text page; `None` disables it.
    #[serde(default)]
    pub prometheus_address: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
            report_interval_seconds: default_report_interval(),
            prometheus_address: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_report_interval() -> u64 {
    60
}
