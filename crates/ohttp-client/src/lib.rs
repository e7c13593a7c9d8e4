//! ohttp-client: client side of the OHTTP exchange
//!
//! Fetches key configurations from a gateway's discovery endpoint, then
//! encapsulates requests and decapsulates responses against it. Used by the
//! gateway's end-to-end tests and usable as a standalone client library.

pub mod client;
pub mod error;

pub use client::GatewayClient;
pub use error::ClientError;

pub type Result<T> = std::result::Result<T, ClientError>;
