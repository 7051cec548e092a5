//! Best-effort metrics exposition: a Prometheus text page over HTTP and a
//! periodic JSON snapshot file. Neither may affect resolution; every
//! failure here is logged and swallowed.

use super::ResolverMetrics;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use compass_dns_domain::MetricsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct MetricsExporter {
    tasks: Vec<JoinHandle<()>>,
}

impl MetricsExporter {
    /// Spawn the exposition tasks described by `config`. Returns a handle
    /// whose drop stops them; configuration reload replaces it wholesale.
    pub fn start(metrics: Arc<ResolverMetrics>, config: &MetricsConfig) -> Self {
        let mut tasks = Vec::new();

        if !config.enabled {
            return Self { tasks };
        }

        if let Some(ref address) = config.prometheus_address {
            match address.parse::<SocketAddr>() {
                Ok(addr) => {
                    tasks.push(tokio::spawn(serve_prometheus(Arc::clone(&metrics), addr)));
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "Invalid Prometheus address, exporter disabled");
                }
            }
        }

        if let Some(ref file) = config.file {
            tasks.push(tokio::spawn(report_to_file(
                Arc::clone(&metrics),
                file.clone(),
                Duration::from_secs(config.report_interval_seconds),
            )));
        }

        Self { tasks }
    }

    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for MetricsExporter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve_prometheus(metrics: Arc<ResolverMetrics>, addr: SocketAddr) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(address = %addr, error = %e, "Failed to bind Prometheus exporter");
            return;
        }
    };

    info!(address = %addr, "Prometheus exporter listening");

    let app = Router::new()
        .route("/metrics", get(metrics_page))
        .with_state(metrics);

    if let Err(e) = axum::serve(listener, app).await {
        warn!(error = %e, "Prometheus exporter stopped");
    }
}

async fn metrics_page(State(metrics): State<Arc<ResolverMetrics>>) -> String {
    metrics.render_prometheus()
}

async fn report_to_file(metrics: Arc<ResolverMetrics>, path: String, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so the first report covers
    // a full interval.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = metrics.export_to_file(&path) {
            warn!(path = %path, error = %e, "Failed to export metrics snapshot");
        }
    }
}
