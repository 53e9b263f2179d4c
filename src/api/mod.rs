pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::InferenceContext;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inference: Arc<InferenceContext>,
    pub service_name: String,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(inference: Arc<InferenceContext>) -> Self {
        Self {
            inference,
            service_name: "ticket-triage-api".to_string(),
            metrics_enabled: true,
        }
    }

    /// Name reported by the health probe
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Expose `GET /metrics`
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}
