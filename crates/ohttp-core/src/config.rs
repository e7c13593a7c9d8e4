//! Key configurations and the gateway's key store
//!
//! A [`KeyStore`] holds the primary configuration plus a derived legacy
//! configuration for clients that predate the post-quantum KEM. The legacy
//! derivation is a deployment contract and must not change:
//! `legacy_key_id = (primary - 128) mod 255` over wrapping u8 arithmetic,
//! and the legacy seed is the primary seed with its last byte XORed `0xFF`.

use crate::error::Error;
use crate::kem::{KemKeyPair, KemPublicKey};
use crate::suite::{AeadId, KdfId, KemId, Suite};
use crate::wire::EncapsulatedRequest;

pub use crate::kem::SEED_LENGTH;

/// Byte length of one serialized (kdf, aead) pair.
const SYMMETRIC_SUITE_LENGTH: usize = 4;

/// A (KDF, AEAD) pair advertised within a key configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricSuite {
    pub kdf: KdfId,
    pub aead: AeadId,
}

/// The public view of a key configuration, as served to clients.
///
/// Wire layout: `key_id (1) || kem_id (2) || public_key || suites_len (2) ||
/// (kdf_id (2) || aead_id (2))*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicConfig {
    pub key_id: u8,
    pub kem: KemId,
    pub public_key: Vec<u8>,
    pub suites: Vec<SymmetricSuite>,
}

impl PublicConfig {
    pub fn marshal(&self) -> Vec<u8> {
        let suites_len = self.suites.len() * SYMMETRIC_SUITE_LENGTH;
        let mut out = Vec::with_capacity(3 + self.public_key.len() + 2 + suites_len);
        out.push(self.key_id);
        out.extend_from_slice(&self.kem.id().to_be_bytes());
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&(suites_len as u16).to_be_bytes());
        for suite in &self.suites {
            out.extend_from_slice(&suite.kdf.id().to_be_bytes());
            out.extend_from_slice(&suite.aead.id().to_be_bytes());
        }
        out
    }

    /// Parse one configuration, returning it and the number of bytes consumed.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize), Error> {
        if bytes.len() < 3 {
            return Err(Error::format("key configuration truncated"));
        }
        let key_id = bytes[0];
        let kem = KemId::from_id(u16::from_be_bytes([bytes[1], bytes[2]]))?;

        let n_pk = kem.n_pk();
        let suites_at = 3 + n_pk;
        if bytes.len() < suites_at + 2 {
            return Err(Error::format("key configuration truncated"));
        }
        let public_key = bytes[3..suites_at].to_vec();

        let suites_len = u16::from_be_bytes([bytes[suites_at], bytes[suites_at + 1]]) as usize;
        if suites_len == 0 || suites_len % SYMMETRIC_SUITE_LENGTH != 0 {
            return Err(Error::format("invalid cipher-suite list length"));
        }
        let end = suites_at + 2 + suites_len;
        if bytes.len() < end {
            return Err(Error::format("key configuration truncated"));
        }

        let mut suites = Vec::with_capacity(suites_len / SYMMETRIC_SUITE_LENGTH);
        for chunk in bytes[suites_at + 2..end].chunks_exact(SYMMETRIC_SUITE_LENGTH) {
            suites.push(SymmetricSuite {
                kdf: KdfId::from_id(u16::from_be_bytes([chunk[0], chunk[1]]))?,
                aead: AeadId::from_id(u16::from_be_bytes([chunk[2], chunk[3]]))?,
            });
        }

        Ok((
            Self {
                key_id,
                kem,
                public_key,
                suites,
            },
            end,
        ))
    }

    /// Parse the concatenated list served by the key-discovery endpoint.
    pub fn parse_list(bytes: &[u8]) -> Result<Vec<Self>, Error> {
        let mut configs = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let (config, consumed) = Self::parse(rest)?;
            configs.push(config);
            rest = &rest[consumed..];
        }
        if configs.is_empty() {
            return Err(Error::format("empty key configuration list"));
        }
        Ok(configs)
    }

    /// The first advertised suite; clients encapsulate with it by default.
    pub fn preferred_suite(&self) -> Result<Suite, Error> {
        let sym = self
            .suites
            .first()
            .ok_or_else(|| Error::format("configuration advertises no suites"))?;
        Ok(Suite::new(self.kem, sym.kdf, sym.aead))
    }

    pub fn kem_public_key(&self) -> Result<KemPublicKey, Error> {
        KemPublicKey::from_bytes(self.kem, &self.public_key)
    }
}

/// A private key configuration held by the gateway.
#[derive(Debug)]
pub struct PrivateConfig {
    key_id: u8,
    suite: Suite,
    key_pair: KemKeyPair,
    public: PublicConfig,
}

impl PrivateConfig {
    /// Deterministically derive a configuration from a 32-byte seed.
    pub fn from_seed(key_id: u8, suite: Suite, seed: &[u8]) -> Result<Self, Error> {
        let seed_arr: [u8; SEED_LENGTH] = seed.try_into().map_err(|_| Error::InvalidSeed {
            expected: SEED_LENGTH,
            actual: seed.len(),
        })?;
        let key_pair = KemKeyPair::derive(suite.kem, &seed_arr);
        let public = PublicConfig {
            key_id,
            kem: suite.kem,
            public_key: key_pair.public_key_bytes(),
            suites: vec![SymmetricSuite {
                kdf: suite.kdf,
                aead: suite.aead,
            }],
        };
        Ok(Self {
            key_id,
            suite,
            key_pair,
            public,
        })
    }

    pub fn key_id(&self) -> u8 {
        self.key_id
    }

    pub fn suite(&self) -> Suite {
        self.suite
    }

    pub fn key_pair(&self) -> &KemKeyPair {
        &self.key_pair
    }

    pub fn config(&self) -> &PublicConfig {
        &self.public
    }
}

/// The gateway's set of simultaneously-active key configurations.
///
/// Shared read-only across all in-flight requests; construction happens once
/// at boot.
#[derive(Debug)]
pub struct KeyStore {
    configs: Vec<PrivateConfig>,
    legacy_key_id: u8,
}

impl KeyStore {
    /// Build the primary configuration from `seed` and derive the legacy
    /// configuration alongside it.
    pub fn from_seed(seed: &[u8], key_id: u8, suite: Suite) -> Result<Self, Error> {
        let primary = PrivateConfig::from_seed(key_id, suite, seed)?;

        let legacy_key_id = key_id.wrapping_sub(128) % 255;
        let mut legacy_seed: [u8; SEED_LENGTH] =
            seed.try_into().map_err(|_| Error::InvalidSeed {
                expected: SEED_LENGTH,
                actual: seed.len(),
            })?;
        legacy_seed[SEED_LENGTH - 1] ^= 0xFF;
        let legacy = PrivateConfig::from_seed(
            legacy_key_id,
            Suite::new(KemId::X25519HkdfSha256, KdfId::HkdfSha256, AeadId::Aes128Gcm),
            &legacy_seed,
        )?;

        Ok(Self {
            configs: vec![primary, legacy],
            legacy_key_id,
        })
    }

    /// Select the configuration an inbound request belongs to.
    ///
    /// Selection requires the exact key id and the exact algorithm triple;
    /// a matching key id with a different suite is no match.
    pub fn matching_config(&self, request: &EncapsulatedRequest) -> Option<&PrivateConfig> {
        self.configs.iter().find(|c| {
            c.key_id == request.key_id
                && c.suite.kem == request.kem
                && c.suite.kdf.id() == request.kdf_id
                && c.suite.aead.id() == request.aead_id
        })
    }

    /// Look up the public form of a configuration by key id.
    pub fn config(&self, key_id: u8) -> Option<&PublicConfig> {
        self.configs
            .iter()
            .find(|c| c.key_id == key_id)
            .map(|c| c.config())
    }

    pub fn legacy_key_id(&self) -> u8 {
        self.legacy_key_id
    }

    /// Concatenated public forms of every stored configuration, primary first.
    pub fn marshal_configs(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for config in &self.configs {
            out.extend_from_slice(&config.config().marshal());
        }
        out
    }

    /// The legacy public configuration alone.
    pub fn marshal_legacy_config(&self) -> Option<Vec<u8>> {
        self.config(self.legacy_key_id).map(PublicConfig::marshal)
    }

    pub fn configs(&self) -> &[PrivateConfig] {
        &self.configs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY_SUITE: Suite = Suite {
        kem: KemId::X25519MlKem768,
        kdf: KdfId::HkdfSha256,
        aead: AeadId::Aes128Gcm,
    };

    fn request_for(config: &PrivateConfig) -> EncapsulatedRequest {
        EncapsulatedRequest {
            key_id: config.key_id(),
            kem: config.suite().kem,
            kdf_id: config.suite().kdf.id(),
            aead_id: config.suite().aead.id(),
            enc: vec![0u8; config.suite().kem.n_enc()],
            ct: vec![0u8; 16],
        }
    }

    #[test]
    fn test_seed_length_enforced() {
        assert!(matches!(
            KeyStore::from_seed(&[0u8; 16], 1, PRIMARY_SUITE),
            Err(Error::InvalidSeed {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_legacy_key_id_derivation() {
        // Wrapping u8 subtraction, then mod 255. The 127 case is the only
        // one where the two moduli diverge.
        for (primary, legacy) in [(1u8, 129u8), (0, 128), (128, 0), (200, 72), (127, 0)] {
            let store = KeyStore::from_seed(&[9u8; 32], primary, PRIMARY_SUITE).unwrap();
            assert_eq!(store.legacy_key_id(), legacy, "primary id {primary}");
        }
    }

    #[test]
    fn test_legacy_seed_is_last_byte_flipped() {
        let seed = [0u8; 32];
        let store = KeyStore::from_seed(&seed, 1, PRIMARY_SUITE).unwrap();

        let mut flipped = seed;
        flipped[31] ^= 0xFF;
        let expected = PrivateConfig::from_seed(
            store.legacy_key_id(),
            Suite::new(KemId::X25519HkdfSha256, KdfId::HkdfSha256, AeadId::Aes128Gcm),
            &flipped,
        )
        .unwrap();

        assert_eq!(
            store.config(store.legacy_key_id()).unwrap().public_key,
            expected.config().public_key
        );
    }

    #[test]
    fn test_store_is_deterministic() {
        let a = KeyStore::from_seed(&[5u8; 32], 3, PRIMARY_SUITE).unwrap();
        let b = KeyStore::from_seed(&[5u8; 32], 3, PRIMARY_SUITE).unwrap();
        assert_eq!(a.marshal_configs(), b.marshal_configs());
    }

    #[test]
    fn test_matching_config_requires_exact_triple() {
        let store = KeyStore::from_seed(&[1u8; 32], 1, PRIMARY_SUITE).unwrap();
        let primary = &store.configs()[0];

        assert!(store.matching_config(&request_for(primary)).is_some());

        // Unknown key id.
        let mut req = request_for(primary);
        req.key_id ^= 0xFF;
        assert!(store.matching_config(&req).is_none());

        // Known key id, wrong KEM.
        let mut req = request_for(primary);
        req.kem = KemId::X25519HkdfSha256;
        assert!(store.matching_config(&req).is_none());

        // Known key id, wrong AEAD.
        let mut req = request_for(primary);
        req.aead_id = AeadId::ChaCha20Poly1305.id();
        assert!(store.matching_config(&req).is_none());

        // The legacy config matches under its own id and suite.
        let legacy = &store.configs()[1];
        assert!(store.matching_config(&request_for(legacy)).is_some());
    }

    #[test]
    fn test_marshal_configs_primary_first() {
        let store = KeyStore::from_seed(&[2u8; 32], 1, PRIMARY_SUITE).unwrap();
        let bytes = store.marshal_configs();

        let configs = PublicConfig::parse_list(&bytes).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].key_id, 1);
        assert_eq!(configs[0].kem, KemId::X25519MlKem768);
        assert_eq!(configs[1].key_id, store.legacy_key_id());
        assert_eq!(configs[1].kem, KemId::X25519HkdfSha256);
    }

    #[test]
    fn test_marshal_legacy_config_round_trip() {
        let store = KeyStore::from_seed(&[2u8; 32], 1, PRIMARY_SUITE).unwrap();
        let bytes = store.marshal_legacy_config().unwrap();
        let (config, consumed) = PublicConfig::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(config.key_id, store.legacy_key_id());
        assert_eq!(
            config.preferred_suite().unwrap(),
            Suite::new(KemId::X25519HkdfSha256, KdfId::HkdfSha256, AeadId::Aes128Gcm)
        );
    }

    #[test]
    fn test_parse_rejects_malformed_lists() {
        assert!(PublicConfig::parse_list(&[]).is_err());
        assert!(PublicConfig::parse_list(&[0x01, 0x00]).is_err());

        let store = KeyStore::from_seed(&[2u8; 32], 1, PRIMARY_SUITE).unwrap();
        let mut bytes = store.marshal_configs();
        bytes.pop();
        assert!(PublicConfig::parse_list(&bytes).is_err());
    }
}
