//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ohttp_core::Error),

    #[error("gateway rejected request with status {0}")]
    GatewayStatus(u16),

    #[error("unexpected response content type: {0:?}")]
    UnexpectedContentType(Option<String>),

    #[error("no usable key configuration advertised")]
    NoConfig,
}
