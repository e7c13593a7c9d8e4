//! Wire formats for encapsulated requests and responses
//!
//! Request: `key_id (1) || kem_id (2) || kdf_id (2) || aead_id (2) || enc || ct`.
//! The `enc` length is fixed by the KEM; there is no explicit prefix.
//!
//! Response: `nonce || ct`, where the nonce length is the AEAD nonce length.

use crate::error::Error;
use crate::suite::{AeadId, KemId};

/// Length of the request header preceding `enc`.
pub const HEADER_LENGTH: usize = 7;

/// A parsed encapsulated request.
///
/// The KEM must be known to split `enc` from the sealed payload, so it is
/// parsed eagerly; the KDF and AEAD identifiers are kept raw and only
/// validated once a stored configuration matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulatedRequest {
    pub key_id: u8,
    pub kem: KemId,
    pub kdf_id: u16,
    pub aead_id: u16,
    pub enc: Vec<u8>,
    pub ct: Vec<u8>,
}

impl EncapsulatedRequest {
    /// Parse a request from its wire form.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_LENGTH {
            return Err(Error::format("encapsulated request shorter than header"));
        }
        let key_id = bytes[0];
        let kem_id = u16::from_be_bytes([bytes[1], bytes[2]]);
        let kdf_id = u16::from_be_bytes([bytes[3], bytes[4]]);
        let aead_id = u16::from_be_bytes([bytes[5], bytes[6]]);

        let kem = KemId::from_id(kem_id)
            .map_err(|_| Error::format(format!("unknown KEM identifier {kem_id:#06x}")))?;

        let rest = &bytes[HEADER_LENGTH..];
        let n_enc = kem.n_enc();
        if rest.len() < n_enc {
            return Err(Error::format("encapsulated request truncated within enc"));
        }
        let (enc, ct) = rest.split_at(n_enc);
        if ct.is_empty() {
            return Err(Error::format("encapsulated request carries no payload"));
        }

        Ok(Self {
            key_id,
            kem,
            kdf_id,
            aead_id,
            enc: enc.to_vec(),
            ct: ct.to_vec(),
        })
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LENGTH + self.enc.len() + self.ct.len());
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.enc);
        out.extend_from_slice(&self.ct);
        out
    }

    /// The 7-byte header, as bound into the HPKE info string.
    pub fn header(&self) -> [u8; HEADER_LENGTH] {
        let mut hdr = [0u8; HEADER_LENGTH];
        hdr[0] = self.key_id;
        hdr[1..3].copy_from_slice(&self.kem.id().to_be_bytes());
        hdr[3..5].copy_from_slice(&self.kdf_id.to_be_bytes());
        hdr[5..7].copy_from_slice(&self.aead_id.to_be_bytes());
        hdr
    }
}

/// An encapsulated response ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulatedResponse {
    pub nonce: Vec<u8>,
    pub ct: Vec<u8>,
}

impl EncapsulatedResponse {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.nonce.len() + self.ct.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ct);
        out
    }

    /// Parse a response. The nonce length depends on the AEAD the client
    /// negotiated, so the caller supplies it.
    pub fn unmarshal(bytes: &[u8], aead: AeadId) -> Result<Self, Error> {
        let n_n = aead.n_n();
        if bytes.len() <= n_n {
            return Err(Error::format("encapsulated response truncated"));
        }
        let (nonce, ct) = bytes.split_at(n_n);
        Ok(Self {
            nonce: nonce.to_vec(),
            ct: ct.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{KdfId, X25519_LEN};

    fn sample_request() -> EncapsulatedRequest {
        EncapsulatedRequest {
            key_id: 0x07,
            kem: KemId::X25519HkdfSha256,
            kdf_id: KdfId::HkdfSha256.id(),
            aead_id: AeadId::Aes128Gcm.id(),
            enc: vec![0xAA; X25519_LEN],
            ct: vec![0xBB; 18],
        }
    }

    #[test]
    fn test_request_round_trip() {
        let req = sample_request();
        let parsed = EncapsulatedRequest::unmarshal(&req.marshal()).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn test_header_layout() {
        let hdr = sample_request().header();
        assert_eq!(hdr, [0x07, 0x00, 0x20, 0x00, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_request_rejects_short_input() {
        assert!(EncapsulatedRequest::unmarshal(&[]).is_err());
        assert!(EncapsulatedRequest::unmarshal(&[0x01, 0x00, 0x20, 0x00]).is_err());

        // Header present but enc truncated.
        let mut bytes = sample_request().marshal();
        bytes.truncate(HEADER_LENGTH + X25519_LEN - 1);
        assert!(EncapsulatedRequest::unmarshal(&bytes).is_err());

        // enc present but empty payload.
        let mut bytes = sample_request().marshal();
        bytes.truncate(HEADER_LENGTH + X25519_LEN);
        assert!(EncapsulatedRequest::unmarshal(&bytes).is_err());
    }

    #[test]
    fn test_request_rejects_unknown_kem() {
        let mut bytes = sample_request().marshal();
        bytes[1] = 0xFF;
        assert!(matches!(
            EncapsulatedRequest::unmarshal(&bytes),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_response_round_trip() {
        let resp = EncapsulatedResponse {
            nonce: vec![0x01; 12],
            ct: vec![0x02; 30],
        };
        let parsed = EncapsulatedResponse::unmarshal(&resp.marshal(), AeadId::Aes128Gcm).unwrap();
        assert_eq!(parsed, resp);

        assert!(EncapsulatedResponse::unmarshal(&[0u8; 12], AeadId::Aes128Gcm).is_err());
    }
}
