//! ohttp-core: Oblivious HTTP encapsulation primitives
//!
//! This crate implements the protocol half of an OHTTP gateway: HPKE key
//! configurations, the encapsulation engine that turns ciphertexts into
//! inner binary-HTTP messages and back, and the wire formats shared between
//! gateway and client.
//!
//! # Privacy & Threat Model
//!
//! OHTTP splits knowledge between two parties so that neither can link a
//! user to their traffic on its own.
//!
//! | Information | Relay | Gateway |
//! |-------------|-------|---------|
//! | Client network identity | YES | NO |
//! | Inner request content | NO - sealed by HPKE | YES |
//! | Inner response status | NO - inner failures seal as outer 200 | YES |
//! | Target origin | NO | YES |
//!
//! The gateway therefore never reflects inner status codes into the outer
//! envelope, and every response-sealing context is single use: it is created
//! by one decapsulation and consumed by exactly one response encapsulation.
//!
//! ## Public Information
//!
//! The following are intentionally public:
//! - Key configurations (key id, algorithm suite, public key)
//! - The outer status partition {200, 400, 401}

pub mod aead;
pub mod bhttp;
pub mod config;
pub mod engine;
pub mod error;
pub mod hpke;
pub mod kdf;
pub mod kem;
pub mod suite;
pub mod wire;

pub use config::{KeyStore, PrivateConfig, PublicConfig, SymmetricSuite, SEED_LENGTH};
pub use engine::{
    Client, ClientResponseContext, Gateway, ResponseContext, DEFAULT_REQUEST_LABEL,
    DEFAULT_RESPONSE_LABEL,
};
pub use error::Error;
pub use suite::{AeadId, KdfId, KemId, Suite};
pub use wire::{EncapsulatedRequest, EncapsulatedResponse};

pub type Result<T> = std::result::Result<T, Error>;

/// Content types exchanged on the outer HTTP envelope.
pub mod content_types {
    pub const OHTTP_REQUEST: &str = "message/ohttp-req";
    pub const OHTTP_RESPONSE: &str = "message/ohttp-res";
    /// Reserved: chunked encapsulation is not implemented.
    pub const OHTTP_CHUNKED_REQUEST: &str = "message/ohttp-chunked-req";
    /// Reserved: chunked encapsulation is not implemented.
    pub const OHTTP_CHUNKED_RESPONSE: &str = "message/ohttp-chunked-res";
    /// Content type of the key-discovery document.
    pub const OHTTP_KEYS: &str = "application/ohttp-keys";
}
