//! HPKE algorithm identifiers and per-algorithm sizes

use fips203::ml_kem_768;

use crate::error::Error;

/// X25519 public keys, shared secrets and encapsulations are all 32 bytes.
pub const X25519_LEN: usize = 32;

/// Key encapsulation mechanisms supported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KemId {
    /// DHKEM(X25519, HKDF-SHA256), RFC 9180.
    X25519HkdfSha256,
    /// Hybrid X25519 + ML-KEM-768. Post-quantum primary suite.
    X25519MlKem768,
}

impl KemId {
    pub const fn id(self) -> u16 {
        match self {
            KemId::X25519HkdfSha256 => 0x0020,
            KemId::X25519MlKem768 => 0x0030,
        }
    }

    pub fn from_id(id: u16) -> Result<Self, Error> {
        match id {
            0x0020 => Ok(KemId::X25519HkdfSha256),
            0x0030 => Ok(KemId::X25519MlKem768),
            other => Err(Error::UnsupportedAlgorithm(other)),
        }
    }

    /// Length of a serialized public key.
    pub const fn n_pk(self) -> usize {
        match self {
            KemId::X25519HkdfSha256 => X25519_LEN,
            KemId::X25519MlKem768 => X25519_LEN + ml_kem_768::EK_LEN,
        }
    }

    /// Length of an encapsulated KEM shared secret on the wire.
    pub const fn n_enc(self) -> usize {
        match self {
            KemId::X25519HkdfSha256 => X25519_LEN,
            KemId::X25519MlKem768 => X25519_LEN + ml_kem_768::CT_LEN,
        }
    }

    /// Length of the KEM shared secret fed into the key schedule.
    pub const fn n_secret(self) -> usize {
        match self {
            KemId::X25519HkdfSha256 => 32,
            KemId::X25519MlKem768 => 64,
        }
    }
}

/// Key derivation functions. Only HKDF-SHA256 is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfId {
    HkdfSha256,
}

impl KdfId {
    pub const fn id(self) -> u16 {
        match self {
            KdfId::HkdfSha256 => 0x0001,
        }
    }

    pub fn from_id(id: u16) -> Result<Self, Error> {
        match id {
            0x0001 => Ok(KdfId::HkdfSha256),
            other => Err(Error::UnsupportedAlgorithm(other)),
        }
    }

    /// Hash output length.
    pub const fn n_h(self) -> usize {
        match self {
            KdfId::HkdfSha256 => 32,
        }
    }
}

/// AEAD algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadId {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl AeadId {
    pub const fn id(self) -> u16 {
        match self {
            AeadId::Aes128Gcm => 0x0001,
            AeadId::Aes256Gcm => 0x0002,
            AeadId::ChaCha20Poly1305 => 0x0003,
        }
    }

    pub fn from_id(id: u16) -> Result<Self, Error> {
        match id {
            0x0001 => Ok(AeadId::Aes128Gcm),
            0x0002 => Ok(AeadId::Aes256Gcm),
            0x0003 => Ok(AeadId::ChaCha20Poly1305),
            other => Err(Error::UnsupportedAlgorithm(other)),
        }
    }

    /// Key length.
    pub const fn n_k(self) -> usize {
        match self {
            AeadId::Aes128Gcm => 16,
            AeadId::Aes256Gcm => 32,
            AeadId::ChaCha20Poly1305 => 32,
        }
    }

    /// Nonce length.
    pub const fn n_n(self) -> usize {
        12
    }
}

/// A full HPKE cipher suite as advertised in a key configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Suite {
    pub kem: KemId,
    pub kdf: KdfId,
    pub aead: AeadId,
}

impl Suite {
    pub fn new(kem: KemId, kdf: KdfId, aead: AeadId) -> Self {
        Self { kem, kdf, aead }
    }

    /// `suite_id` for the HPKE key schedule: "HPKE" || kem || kdf || aead.
    pub fn hpke_suite_id(&self) -> [u8; 10] {
        let mut id = [0u8; 10];
        id[..4].copy_from_slice(b"HPKE");
        id[4..6].copy_from_slice(&self.kem.id().to_be_bytes());
        id[6..8].copy_from_slice(&self.kdf.id().to_be_bytes());
        id[8..10].copy_from_slice(&self.aead.id().to_be_bytes());
        id
    }
}

/// `suite_id` for KEM-internal derivation: "KEM" || kem_id.
pub fn kem_suite_id(kem: KemId) -> [u8; 5] {
    let mut id = [0u8; 5];
    id[..3].copy_from_slice(b"KEM");
    id[3..5].copy_from_slice(&kem.id().to_be_bytes());
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        for kem in [KemId::X25519HkdfSha256, KemId::X25519MlKem768] {
            assert_eq!(KemId::from_id(kem.id()).unwrap(), kem);
        }
        for aead in [AeadId::Aes128Gcm, AeadId::Aes256Gcm, AeadId::ChaCha20Poly1305] {
            assert_eq!(AeadId::from_id(aead.id()).unwrap(), aead);
        }
        assert_eq!(KdfId::from_id(0x0001).unwrap(), KdfId::HkdfSha256);
    }

    #[test]
    fn test_unknown_ids_rejected() {
        assert!(matches!(
            KemId::from_id(0x0010),
            Err(Error::UnsupportedAlgorithm(0x0010))
        ));
        assert!(matches!(KdfId::from_id(0x0003), Err(Error::UnsupportedAlgorithm(_))));
        assert!(matches!(AeadId::from_id(0xFFFF), Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_hybrid_sizes() {
        let kem = KemId::X25519MlKem768;
        assert_eq!(kem.n_pk(), 32 + 1184);
        assert_eq!(kem.n_enc(), 32 + 1088);
        assert_eq!(kem.n_secret(), 64);
    }

    #[test]
    fn test_suite_id_layout() {
        let suite = Suite::new(KemId::X25519MlKem768, KdfId::HkdfSha256, AeadId::Aes128Gcm);
        let id = suite.hpke_suite_id();
        assert_eq!(&id[..4], b"HPKE");
        assert_eq!(&id[4..6], &[0x00, 0x30]);
        assert_eq!(&id[6..8], &[0x00, 0x01]);
        assert_eq!(&id[8..10], &[0x00, 0x01]);
    }
}
