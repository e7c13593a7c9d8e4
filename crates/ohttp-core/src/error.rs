//! Error types for ohttp-core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No stored key configuration matches the request's key id and suite.
    #[error("configuration mismatch")]
    ConfigMismatch,

    /// An HPKE or AEAD primitive failed. Deliberately carries no detail:
    /// decryption failures must stay indistinguishable to the sender.
    #[error("encapsulation error")]
    Encapsulation,

    #[error("invalid seed length: expected {expected} bytes, got {actual}")]
    InvalidSeed { expected: usize, actual: usize },

    #[error("unsupported algorithm identifier {0:#06x}")]
    UnsupportedAlgorithm(u16),

    #[error("malformed message: {0}")]
    Format(String),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }
}
