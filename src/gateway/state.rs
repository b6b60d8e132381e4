use metrics_exporter_prometheus::PrometheusHandle;

use crate::transfer::TransferService;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle engine
    pub service: TransferService,
    /// HS256 secret for bearer tokens
    pub jwt_secret: String,
    /// Prometheus render handle; `None` when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: TransferService, jwt_secret: impl Into<String>) -> Self {
        Self {
            service,
            jwt_secret: jwt_secret.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
