use crate::{config::Config, server::url_validation::AllowList, upstream};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Upstream hosts the proxy may contact, fixed at startup
    pub allow_list: AllowList,
    /// Shared HTTP client for connection pooling
    pub http_client: Client,
    /// Prometheus registry rendered at `/metrics`
    pub metrics: PrometheusHandle,
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Self {
        let allow_list = AllowList::new(&config.allowed_hosts);

        let http_client = upstream::build_client(allow_list.clone(), config.upstream_timeout())
            .expect("Failed to create HTTP client");

        Self {
            config: Arc::new(config),
            allow_list,
            http_client,
            metrics: crate::metrics::init(),
            started_at: Instant::now(),
        }
    }
}
