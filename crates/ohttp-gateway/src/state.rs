//! Shared application state
//!
//! The key store (inside the engine), the handler table and the outbound
//! client are shared read-only across requests; per-request state lives in
//! each handler invocation.

use std::collections::HashMap;
use std::sync::Arc;

use ohttp_core::Gateway;

use crate::config::Endpoints;
use crate::handler::EncapsulationHandler;
use crate::metrics::MetricsFactory;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Encapsulation handlers keyed by outer URL path.
    pub handlers: Arc<HashMap<String, EncapsulationHandler>>,
    pub metrics: MetricsFactory,
    pub endpoints: Arc<Endpoints>,
    /// When set, outer error bodies carry the human-readable reason.
    pub debug_response: bool,
}

impl AppState {
    pub fn new(
        gateway: Arc<Gateway>,
        handlers: HashMap<String, EncapsulationHandler>,
        endpoints: Endpoints,
        debug_response: bool,
    ) -> Self {
        Self {
            gateway,
            handlers: Arc::new(handlers),
            metrics: MetricsFactory::new(),
            endpoints: Arc::new(endpoints),
            debug_response,
        }
    }
}
