//! Prometheus metrics for the store runtime.
//!
//! Metrics are recorded through the `metrics` facade and are no-ops until a
//! recorder is installed. [`MetricsServer`] installs the Prometheus recorder
//! and, when given an address, serves it for scraping:
//!
//! - Action routing (`store_actions_total`)
//! - The load effect (requests, outcomes, superseded and stale loads, latency)
//!
//! # Example
//!
//! ```rust,no_run
//! use pagestore_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Serve metrics on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// The HTTP listener needs a tokio runtime to run on
    #[error("Metrics listener requires a tokio runtime")]
    NoRuntime,
}

/// Prometheus metrics server.
///
/// With an address, exposes metrics on an HTTP endpoint for Prometheus
/// scraping. Without one, only installs the recorder so that
/// [`render`](Self::render) can dump the current values.
pub struct MetricsServer {
    addr: Option<SocketAddr>,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a metrics server that listens on `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr: Some(addr),
            handle: None,
        }
    }

    /// Create a metrics server without an HTTP listener.
    #[must_use]
    pub const fn render_only() -> Self {
        Self {
            addr: None,
            handle: None,
        }
    }

    /// Install the Prometheus recorder and start the listener, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed, or if a
    /// listener is requested outside a tokio runtime.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs
    /// a warning and leaves [`handle`](Self::handle) empty.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match self.addr {
            Some(addr) => self.start_listener(builder, addr),
            None => self.install(builder),
        }
    }

    fn install(&mut self, builder: PrometheusBuilder) -> Result<(), MetricsError> {
        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::debug!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    fn start_listener(
        &mut self,
        builder: PrometheusBuilder,
        addr: SocketAddr,
    ) -> Result<(), MetricsError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MetricsError::NoRuntime)?;
        let (recorder, exporter) = builder
            .with_http_listener(addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("Metrics recorder already initialized, not starting listener");
            return Ok(());
        }

        runtime.spawn(async move {
            if let Err(error) = exporter.await {
                tracing::error!(error = ?error, "Metrics listener stopped");
            }
        });

        self.handle = Some(handle);
        tracing::info!(
            addr = %addr,
            "Metrics server started - available at http://{}/metrics",
            addr
        );
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for MetricsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsServer")
            .field("addr", &self.addr)
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "store_actions_total",
        "Total number of actions emitted, labelled by action"
    );

    describe_counter!("load_requests_total", "Total number of load requests");
    describe_counter!(
        "load_superseded_total",
        "Loads cancelled because a newer request arrived"
    );
    describe_counter!(
        "load_succeeded_total",
        "Loads whose items replaced the store's items"
    );
    describe_counter!(
        "load_failed_total",
        "Loads that reported a fetch error"
    );
    describe_counter!(
        "load_stale_discarded_total",
        "Fetch results dropped because their request was superseded"
    );
    describe_histogram!(
        "load_duration_seconds",
        "Time taken by the fetcher to return a page"
    );
}

/// Action routing metrics recorder.
pub struct ActionMetrics;

impl ActionMetrics {
    /// Record an action emitted on `action`'s channel.
    pub fn record(action: &'static str) {
        counter!("store_actions_total", "action" => action).increment(1);
    }
}

/// Load effect metrics recorder.
pub struct LoadMetrics;

impl LoadMetrics {
    /// Record a load request.
    pub fn record_request() {
        counter!("load_requests_total").increment(1);
    }

    /// Record an in-flight load being superseded.
    pub fn record_superseded() {
        counter!("load_superseded_total").increment(1);
    }

    /// Record how long a fetch took, whatever its outcome.
    pub fn record_fetch(duration: Duration) {
        histogram!("load_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a successful load.
    pub fn record_success() {
        counter!("load_succeeded_total").increment(1);
    }

    /// Record a failed load.
    pub fn record_failure() {
        counter!("load_failed_total").increment(1);
    }

    /// Record a fetch result dropped as stale.
    pub fn record_stale() {
        counter!("load_stale_discarded_total").increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_listener_requires_runtime() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(matches!(server.start(), Err(MetricsError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_load_metrics_render() {
        let mut server = MetricsServer::render_only();
        server.start().unwrap();

        LoadMetrics::record_request();
        LoadMetrics::record_fetch(Duration::from_millis(40));
        LoadMetrics::record_success();
        ActionMetrics::record("request_load");

        // If another test installed the recorder first, handle is None.
        // Metrics are still recorded globally.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("load_requests_total"));
            assert!(rendered.contains("load_succeeded_total"));
            assert!(rendered.contains("store_actions_total{action=\"request_load\"}"));
        }
    }
}
