//! ohttp-gateway: the gateway role of Oblivious HTTP
//!
//! Receives encapsulated requests forwarded by an untrusted relay, decrypts
//! them with private HPKE keys, executes the inner request against an
//! allowlisted target origin and returns an encapsulated response. The relay
//! only ever observes the outer status partition {200, 400, 401}; inner
//! application failures are sealed into the response body.

pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Endpoints, GatewayConfig};
pub use error::GatewayError;
pub use handler::{AppHandler, EncapsulationHandler, TargetClient};
pub use metrics::{MetricsFactory, RequestMetrics};
pub use routes::create_router;
pub use server::GatewayServer;
pub use state::AppState;
