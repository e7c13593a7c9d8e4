//! The encapsulation engine: gateway receive side and client send side
//!
//! Pure over its inputs. No I/O and no metrics happen here; callers observe
//! outcomes through the returned errors.
//!
//! Response sealing follows the OHTTP construction: the AEAD secret is
//! exported from the request context under the response label, then combined
//! with `enc || response_nonce` to derive the key and nonce. The
//! [`ResponseContext`] is consumed by encapsulation, so a context can never
//! seal two responses or outlive its request.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::aead;
use crate::config::{KeyStore, PublicConfig};
use crate::error::Error;
use crate::hpke;
use crate::kdf;
use crate::suite::Suite;
use crate::wire::{EncapsulatedRequest, EncapsulatedResponse, HEADER_LENGTH};

/// HPKE info label for inner requests, unless a custom pair is configured.
pub const DEFAULT_REQUEST_LABEL: &str = "message/bhttp request";
/// Exporter label for inner responses, unless a custom pair is configured.
pub const DEFAULT_RESPONSE_LABEL: &str = "message/bhttp response";

/// `label || 0x00 || header` as bound into the request's HPKE info string.
fn request_info(label: &str, header: &[u8; HEADER_LENGTH]) -> Vec<u8> {
    let mut info = Vec::with_capacity(label.len() + 1 + HEADER_LENGTH);
    info.extend_from_slice(label.as_bytes());
    info.push(0x00);
    info.extend_from_slice(header);
    info
}

/// Derive the response AEAD key and nonce shared by both directions.
fn response_keys(
    suite: Suite,
    exporter_secret: &[u8; 32],
    response_label: &str,
    enc: &[u8],
    response_nonce: &[u8],
) -> (Zeroizing<Vec<u8>>, Vec<u8>) {
    let n_k = suite.aead.n_k();
    let n_n = suite.aead.n_n();

    let secret = hpke::export(suite, exporter_secret, response_label.as_bytes(), n_k);

    let mut salt = Vec::with_capacity(enc.len() + response_nonce.len());
    salt.extend_from_slice(enc);
    salt.extend_from_slice(response_nonce);

    let prk = kdf::extract(&salt, &secret);
    let key = Zeroizing::new(kdf::expand(&prk, b"key", n_k));
    let nonce = kdf::expand(&prk, b"nonce", n_n);
    (key, nonce)
}

/// Gateway-side engine: holds the key store and the configured label pair.
#[derive(Debug)]
pub struct Gateway {
    store: KeyStore,
    request_label: String,
    response_label: String,
}

impl Gateway {
    pub fn new(store: KeyStore) -> Self {
        Self::with_labels(store, DEFAULT_REQUEST_LABEL, DEFAULT_RESPONSE_LABEL)
    }

    pub fn with_labels(
        store: KeyStore,
        request_label: impl Into<String>,
        response_label: impl Into<String>,
    ) -> Self {
        Self {
            store,
            request_label: request_label.into(),
            response_label: response_label.into(),
        }
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    pub fn request_label(&self) -> &str {
        &self.request_label
    }

    pub fn response_label(&self) -> &str {
        &self.response_label
    }

    /// Decapsulate a request into its inner plaintext and the one-shot
    /// context that will seal the response.
    ///
    /// Fails with [`Error::ConfigMismatch`] when no stored configuration
    /// matches, and [`Error::Encapsulation`] for every primitive failure.
    pub fn decapsulate(
        &self,
        request: &EncapsulatedRequest,
    ) -> Result<(Vec<u8>, ResponseContext), Error> {
        let config = self
            .store
            .matching_config(request)
            .ok_or(Error::ConfigMismatch)?;

        let info = request_info(&self.request_label, &request.header());
        let mut ctx =
            hpke::setup_receiver(config.suite(), config.key_pair(), &request.enc, &info)?;
        let plaintext = ctx.open(b"", &request.ct)?;

        Ok((
            plaintext,
            ResponseContext {
                suite: config.suite(),
                enc: request.enc.clone(),
                exporter_secret: ctx.exporter_secret(),
                response_label: self.response_label.clone(),
            },
        ))
    }
}

/// Response-sealing material carried from decapsulation.
///
/// Must be moved, not shared: [`ResponseContext::encapsulate_response`]
/// consumes it, which makes reuse across responses or requests a compile
/// error rather than a protocol violation.
pub struct ResponseContext {
    suite: Suite,
    enc: Vec<u8>,
    exporter_secret: [u8; 32],
    response_label: String,
}

impl std::fmt::Debug for ResponseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseContext")
            .field("suite", &self.suite)
            .field("enc", &self.enc)
            .field("exporter_secret", &"[REDACTED]")
            .field("response_label", &self.response_label)
            .finish()
    }
}

impl ResponseContext {
    /// Seal `plaintext` as the encapsulated response for this exchange.
    pub fn encapsulate_response(self, plaintext: &[u8]) -> Result<EncapsulatedResponse, Error> {
        let mut response_nonce = vec![0u8; self.suite.aead.n_n()];
        OsRng.fill_bytes(&mut response_nonce);

        let (key, nonce) = response_keys(
            self.suite,
            &self.exporter_secret,
            &self.response_label,
            &self.enc,
            &response_nonce,
        );
        let ct = aead::seal(self.suite.aead, &key, &nonce, b"", plaintext)?;

        Ok(EncapsulatedResponse {
            nonce: response_nonce,
            ct,
        })
    }
}

impl Drop for ResponseContext {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.exporter_secret.zeroize();
    }
}

/// Client-side encapsulation against one public configuration.
#[derive(Debug, Clone)]
pub struct Client {
    config: PublicConfig,
    request_label: String,
    response_label: String,
}

impl Client {
    pub fn new(config: PublicConfig) -> Self {
        Self::with_labels(config, DEFAULT_REQUEST_LABEL, DEFAULT_RESPONSE_LABEL)
    }

    pub fn with_labels(
        config: PublicConfig,
        request_label: impl Into<String>,
        response_label: impl Into<String>,
    ) -> Self {
        Self {
            config,
            request_label: request_label.into(),
            response_label: response_label.into(),
        }
    }

    pub fn config(&self) -> &PublicConfig {
        &self.config
    }

    /// Encapsulate `plaintext` to the configured gateway key.
    pub fn encapsulate_request(
        &self,
        plaintext: &[u8],
    ) -> Result<(EncapsulatedRequest, ClientResponseContext), Error> {
        let suite = self.config.preferred_suite()?;
        let pk = self.config.kem_public_key()?;

        let mut request = EncapsulatedRequest {
            key_id: self.config.key_id,
            kem: suite.kem,
            kdf_id: suite.kdf.id(),
            aead_id: suite.aead.id(),
            enc: Vec::new(),
            ct: Vec::new(),
        };

        let info = request_info(&self.request_label, &request.header());
        let (enc, mut ctx) = hpke::setup_sender(suite, &pk, &info)?;
        request.ct = ctx.seal(b"", plaintext)?;

        let response_ctx = ClientResponseContext {
            suite,
            enc: enc.clone(),
            exporter_secret: ctx.exporter_secret(),
            response_label: self.response_label.clone(),
        };
        request.enc = enc;

        Ok((request, response_ctx))
    }
}

/// Client-side material for opening the encapsulated response.
pub struct ClientResponseContext {
    suite: Suite,
    enc: Vec<u8>,
    exporter_secret: [u8; 32],
    response_label: String,
}

impl ClientResponseContext {
    pub fn suite(&self) -> Suite {
        self.suite
    }

    /// Open an encapsulated response produced for this exchange.
    pub fn decapsulate_response(self, response: &EncapsulatedResponse) -> Result<Vec<u8>, Error> {
        let (key, nonce) = response_keys(
            self.suite,
            &self.exporter_secret,
            &self.response_label,
            &self.enc,
            &response.nonce,
        );
        aead::open(self.suite.aead, &key, &nonce, b"", &response.ct)
    }
}

impl Drop for ClientResponseContext {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.exporter_secret.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{AeadId, KdfId, KemId};
    use crate::wire::EncapsulatedResponse;

    const SUITE: Suite = Suite {
        kem: KemId::X25519MlKem768,
        kdf: KdfId::HkdfSha256,
        aead: AeadId::Aes128Gcm,
    };

    fn gateway() -> Gateway {
        Gateway::new(KeyStore::from_seed(&[0u8; 32], 1, SUITE).unwrap())
    }

    #[test]
    fn test_request_response_round_trip() {
        let gateway = gateway();
        let client = Client::new(gateway.store().config(1).unwrap().clone());

        let (request, client_ctx) = client.encapsulate_request(&[0xCA, 0xFE]).unwrap();
        let (plaintext, gateway_ctx) = gateway.decapsulate(&request).unwrap();
        assert_eq!(plaintext, vec![0xCA, 0xFE]);

        let response = gateway_ctx.encapsulate_response(b"inner response").unwrap();
        assert_eq!(response.nonce.len(), SUITE.aead.n_n());
        let opened = client_ctx.decapsulate_response(&response).unwrap();
        assert_eq!(opened, b"inner response");
    }

    #[test]
    fn test_round_trip_through_wire_form() {
        let gateway = gateway();
        let client = Client::new(gateway.store().config(1).unwrap().clone());

        let message: Vec<u8> = (0u8..=255).collect();
        let (request, client_ctx) = client.encapsulate_request(&message).unwrap();

        let parsed = EncapsulatedRequest::unmarshal(&request.marshal()).unwrap();
        let (plaintext, gateway_ctx) = gateway.decapsulate(&parsed).unwrap();
        assert_eq!(plaintext, message);

        let response = gateway_ctx.encapsulate_response(&plaintext).unwrap();
        let parsed = EncapsulatedResponse::unmarshal(&response.marshal(), SUITE.aead).unwrap();
        assert_eq!(client_ctx.decapsulate_response(&parsed).unwrap(), message);
    }

    #[test]
    fn test_legacy_config_round_trip() {
        let gateway = gateway();
        let legacy_id = gateway.store().legacy_key_id();
        let client = Client::new(gateway.store().config(legacy_id).unwrap().clone());

        let (request, _ctx) = client.encapsulate_request(b"legacy").unwrap();
        let (plaintext, _gateway_ctx) = gateway.decapsulate(&request).unwrap();
        assert_eq!(plaintext, b"legacy");
    }

    #[test]
    fn test_unknown_key_id_is_config_mismatch() {
        let gateway = gateway();
        let mut config = gateway.store().config(1).unwrap().clone();
        config.key_id ^= 0xFF;
        let client = Client::new(config);

        let (request, _) = client.encapsulate_request(b"x").unwrap();
        assert_eq!(
            gateway.decapsulate(&request).unwrap_err(),
            Error::ConfigMismatch
        );
    }

    #[test]
    fn test_suite_mismatch_is_config_mismatch() {
        let gateway = gateway();

        // Borrow the legacy X25519 public key but claim the primary key id:
        // known algorithms, no matching stored configuration.
        let legacy_id = gateway.store().legacy_key_id();
        let mut config = gateway.store().config(legacy_id).unwrap().clone();
        config.key_id = 1;
        let client = Client::new(config);

        let (request, _) = client.encapsulate_request(b"x").unwrap();
        assert_eq!(
            gateway.decapsulate(&request).unwrap_err(),
            Error::ConfigMismatch
        );
    }

    #[test]
    fn test_tampered_payload_is_encapsulation_error() {
        let gateway = gateway();
        let client = Client::new(gateway.store().config(1).unwrap().clone());

        let (request, _) = client.encapsulate_request(&[0xCA, 0xFE]).unwrap();
        let mut bytes = request.marshal();
        *bytes.last_mut().unwrap() ^= 0xFF;

        let tampered = EncapsulatedRequest::unmarshal(&bytes).unwrap();
        assert_eq!(
            gateway.decapsulate(&tampered).unwrap_err(),
            Error::Encapsulation
        );
    }

    #[test]
    fn test_custom_labels_must_agree() {
        let store = KeyStore::from_seed(&[0u8; 32], 1, SUITE).unwrap();
        let gateway = Gateway::with_labels(store, "message/custom request", "message/custom response");
        let config = gateway.store().config(1).unwrap().clone();

        let matching = Client::with_labels(
            config.clone(),
            "message/custom request",
            "message/custom response",
        );
        let (request, _) = matching.encapsulate_request(b"ok").unwrap();
        assert!(gateway.decapsulate(&request).is_ok());

        let mismatched = Client::new(config);
        let (request, _) = mismatched.encapsulate_request(b"bad").unwrap();
        assert_eq!(
            gateway.decapsulate(&request).unwrap_err(),
            Error::Encapsulation
        );
    }

    #[test]
    fn test_tampered_response_fails_open() {
        let gateway = gateway();
        let client = Client::new(gateway.store().config(1).unwrap().clone());

        let (request, client_ctx) = client.encapsulate_request(b"msg").unwrap();
        let (_, gateway_ctx) = gateway.decapsulate(&request).unwrap();
        let mut response = gateway_ctx.encapsulate_response(b"resp").unwrap();
        *response.ct.last_mut().unwrap() ^= 0x01;

        assert_eq!(
            client_ctx.decapsulate_response(&response).unwrap_err(),
            Error::Encapsulation
        );
    }
}
