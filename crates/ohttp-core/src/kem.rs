//! KEM implementations: DHKEM(X25519, HKDF-SHA256) and hybrid X25519 + ML-KEM-768
//!
//! The hybrid KEM concatenates the raw X25519 Diffie-Hellman output with the
//! ML-KEM shared secret (64 bytes total) and its encapsulation is the
//! ephemeral X25519 public key followed by the ML-KEM ciphertext. Private
//! keys derive deterministically from a 32-byte seed so that a gateway
//! restarted with the same seed keeps serving the same configurations.

use fips203::ml_kem_768;
use fips203::traits::{Decaps as _, Encaps as _, KeyGen as _, SerDes as _};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret as X25519Secret};
use zeroize::Zeroizing;

use crate::error::Error;
use crate::kdf;
use crate::suite::{kem_suite_id, KemId, X25519_LEN};

/// Seed length for deterministic key derivation.
pub const SEED_LENGTH: usize = 32;

/// A KEM private/public key pair held by the gateway.
pub enum KemKeyPair {
    X25519 {
        sk: X25519Secret,
        pk: X25519Public,
    },
    Hybrid {
        x_sk: X25519Secret,
        x_pk: X25519Public,
        ml_ek: ml_kem_768::EncapsKey,
        ml_dk: ml_kem_768::DecapsKey,
    },
}

impl KemKeyPair {
    /// Deterministically derive a key pair from a 32-byte seed.
    ///
    /// The seed runs through the RFC 9180 `DeriveKeyPair` labeled-HKDF flow;
    /// the hybrid KEM expands it into the X25519 secret plus the ML-KEM
    /// (d, z) generation seeds.
    pub fn derive(kem: KemId, seed: &[u8; SEED_LENGTH]) -> Self {
        let suite_id = kem_suite_id(kem);
        let dkp_prk = kdf::labeled_extract(&suite_id, b"", "dkp_prk", seed);
        match kem {
            KemId::X25519HkdfSha256 => {
                let okm = Zeroizing::new(kdf::labeled_expand(
                    &suite_id, &dkp_prk, "sk", b"", X25519_LEN,
                ));
                let mut sk_bytes = [0u8; X25519_LEN];
                sk_bytes.copy_from_slice(&okm);
                let sk = X25519Secret::from(sk_bytes);
                let pk = X25519Public::from(&sk);
                KemKeyPair::X25519 { sk, pk }
            }
            KemId::X25519MlKem768 => {
                let okm = Zeroizing::new(kdf::labeled_expand(&suite_id, &dkp_prk, "sk", b"", 96));
                let mut x = [0u8; 32];
                let mut d = [0u8; 32];
                let mut z = [0u8; 32];
                x.copy_from_slice(&okm[..32]);
                d.copy_from_slice(&okm[32..64]);
                z.copy_from_slice(&okm[64..96]);
                let x_sk = X25519Secret::from(x);
                let x_pk = X25519Public::from(&x_sk);
                let (ml_ek, ml_dk) = ml_kem_768::KG::keygen_from_seed(d, z);
                KemKeyPair::Hybrid {
                    x_sk,
                    x_pk,
                    ml_ek,
                    ml_dk,
                }
            }
        }
    }

    pub fn kem(&self) -> KemId {
        match self {
            KemKeyPair::X25519 { .. } => KemId::X25519HkdfSha256,
            KemKeyPair::Hybrid { .. } => KemId::X25519MlKem768,
        }
    }

    /// The public half, serialized for a key configuration.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        match self {
            KemKeyPair::X25519 { pk, .. } => pk.as_bytes().to_vec(),
            KemKeyPair::Hybrid { x_pk, ml_ek, .. } => {
                let mut bytes = Vec::with_capacity(KemId::X25519MlKem768.n_pk());
                bytes.extend_from_slice(x_pk.as_bytes());
                bytes.extend_from_slice(&ml_ek.clone().into_bytes());
                bytes
            }
        }
    }

    /// Recover the KEM shared secret from an encapsulation.
    pub fn decap(&self, enc: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        match self {
            KemKeyPair::X25519 { sk, pk } => {
                let enc_arr: [u8; X25519_LEN] =
                    enc.try_into().map_err(|_| Error::Encapsulation)?;
                let dh = sk.diffie_hellman(&X25519Public::from(enc_arr));
                let mut kem_context = Vec::with_capacity(2 * X25519_LEN);
                kem_context.extend_from_slice(enc);
                kem_context.extend_from_slice(pk.as_bytes());
                Ok(Zeroizing::new(extract_and_expand(
                    dh.as_bytes(),
                    &kem_context,
                )))
            }
            KemKeyPair::Hybrid { x_sk, ml_dk, .. } => {
                if enc.len() != KemId::X25519MlKem768.n_enc() {
                    return Err(Error::Encapsulation);
                }
                let mut epk = [0u8; X25519_LEN];
                epk.copy_from_slice(&enc[..X25519_LEN]);
                let dh = x_sk.diffie_hellman(&X25519Public::from(epk));

                let ct_arr: [u8; ml_kem_768::CT_LEN] = enc[X25519_LEN..]
                    .try_into()
                    .map_err(|_| Error::Encapsulation)?;
                let ct = ml_kem_768::CipherText::try_from_bytes(ct_arr)
                    .map_err(|_| Error::Encapsulation)?;
                let ml_ss = ml_dk.try_decaps(&ct).map_err(|_| Error::Encapsulation)?;

                let mut ss = Zeroizing::new(Vec::with_capacity(64));
                ss.extend_from_slice(dh.as_bytes());
                ss.extend_from_slice(&ml_ss.into_bytes());
                Ok(ss)
            }
        }
    }
}

impl std::fmt::Debug for KemKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KemKeyPair({:?}, [REDACTED])", self.kem())
    }
}

/// A KEM public key as parsed from a key configuration.
#[derive(Clone)]
pub enum KemPublicKey {
    X25519(X25519Public),
    Hybrid {
        x_pk: X25519Public,
        ml_ek: ml_kem_768::EncapsKey,
    },
}

impl KemPublicKey {
    pub fn kem(&self) -> KemId {
        match self {
            KemPublicKey::X25519(_) => KemId::X25519HkdfSha256,
            KemPublicKey::Hybrid { .. } => KemId::X25519MlKem768,
        }
    }

    pub fn from_bytes(kem: KemId, bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != kem.n_pk() {
            return Err(Error::format(format!(
                "public key length {} does not match KEM {:#06x}",
                bytes.len(),
                kem.id()
            )));
        }
        match kem {
            KemId::X25519HkdfSha256 => {
                let mut pk = [0u8; X25519_LEN];
                pk.copy_from_slice(bytes);
                Ok(KemPublicKey::X25519(X25519Public::from(pk)))
            }
            KemId::X25519MlKem768 => {
                let mut x_pk = [0u8; X25519_LEN];
                x_pk.copy_from_slice(&bytes[..X25519_LEN]);
                let ek_arr: [u8; ml_kem_768::EK_LEN] = bytes[X25519_LEN..]
                    .try_into()
                    .map_err(|_| Error::format("invalid ML-KEM public key length"))?;
                let ml_ek = ml_kem_768::EncapsKey::try_from_bytes(ek_arr)
                    .map_err(|e| Error::format(format!("invalid ML-KEM public key: {e}")))?;
                Ok(KemPublicKey::Hybrid {
                    x_pk: X25519Public::from(x_pk),
                    ml_ek,
                })
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            KemPublicKey::X25519(pk) => pk.as_bytes().to_vec(),
            KemPublicKey::Hybrid { x_pk, ml_ek } => {
                let mut bytes = Vec::with_capacity(KemId::X25519MlKem768.n_pk());
                bytes.extend_from_slice(x_pk.as_bytes());
                bytes.extend_from_slice(&ml_ek.clone().into_bytes());
                bytes
            }
        }
    }

    /// Encapsulate a fresh shared secret to this public key.
    ///
    /// Returns `(shared_secret, enc)`.
    pub fn encap(&self) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>), Error> {
        let esk = X25519Secret::random_from_rng(OsRng);
        let epk = X25519Public::from(&esk);
        match self {
            KemPublicKey::X25519(pk) => {
                let dh = esk.diffie_hellman(pk);
                let mut kem_context = Vec::with_capacity(2 * X25519_LEN);
                kem_context.extend_from_slice(epk.as_bytes());
                kem_context.extend_from_slice(pk.as_bytes());
                let ss = Zeroizing::new(extract_and_expand(dh.as_bytes(), &kem_context));
                Ok((ss, epk.as_bytes().to_vec()))
            }
            KemPublicKey::Hybrid { x_pk, ml_ek } => {
                let dh = esk.diffie_hellman(x_pk);
                let (ml_ss, ml_ct) = ml_ek.try_encaps().map_err(|_| Error::Encapsulation)?;

                let mut ss = Zeroizing::new(Vec::with_capacity(64));
                ss.extend_from_slice(dh.as_bytes());
                ss.extend_from_slice(&ml_ss.into_bytes());

                let mut enc = Vec::with_capacity(KemId::X25519MlKem768.n_enc());
                enc.extend_from_slice(epk.as_bytes());
                enc.extend_from_slice(&ml_ct.into_bytes());
                Ok((ss, enc))
            }
        }
    }
}

impl std::fmt::Debug for KemPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KemPublicKey({:?})", self.kem())
    }
}

/// DHKEM `ExtractAndExpand` for the X25519 half, RFC 9180 section 4.1.
fn extract_and_expand(dh: &[u8], kem_context: &[u8]) -> Vec<u8> {
    let suite_id = kem_suite_id(KemId::X25519HkdfSha256);
    let eae_prk = kdf::labeled_extract(&suite_id, b"", "eae_prk", dh);
    kdf::labeled_expand(&suite_id, &eae_prk, "shared_secret", kem_context, 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x25519_encap_decap_agree() {
        let kp = KemKeyPair::derive(KemId::X25519HkdfSha256, &[7u8; 32]);
        let pk = KemPublicKey::from_bytes(KemId::X25519HkdfSha256, &kp.public_key_bytes()).unwrap();
        let (ss, enc) = pk.encap().unwrap();
        assert_eq!(enc.len(), 32);
        let recovered = kp.decap(&enc).unwrap();
        assert_eq!(&*ss, &*recovered);
    }

    #[test]
    fn test_hybrid_encap_decap_agree() {
        let kp = KemKeyPair::derive(KemId::X25519MlKem768, &[1u8; 32]);
        let pk = KemPublicKey::from_bytes(KemId::X25519MlKem768, &kp.public_key_bytes()).unwrap();
        let (ss, enc) = pk.encap().unwrap();
        assert_eq!(enc.len(), KemId::X25519MlKem768.n_enc());
        assert_eq!(ss.len(), 64);
        let recovered = kp.decap(&enc).unwrap();
        assert_eq!(&*ss, &*recovered);
    }

    #[test]
    fn test_derivation_deterministic() {
        for kem in [KemId::X25519HkdfSha256, KemId::X25519MlKem768] {
            let a = KemKeyPair::derive(kem, &[42u8; 32]);
            let b = KemKeyPair::derive(kem, &[42u8; 32]);
            let c = KemKeyPair::derive(kem, &[43u8; 32]);
            assert_eq!(a.public_key_bytes(), b.public_key_bytes());
            assert_ne!(a.public_key_bytes(), c.public_key_bytes());
        }
    }

    #[test]
    fn test_decap_rejects_bad_lengths() {
        let kp = KemKeyPair::derive(KemId::X25519MlKem768, &[0u8; 32]);
        assert!(kp.decap(&[0u8; 31]).is_err());
        assert!(kp.decap(&[0u8; 1121]).is_err());
    }

    #[test]
    fn test_public_key_round_trip() {
        let kp = KemKeyPair::derive(KemId::X25519MlKem768, &[9u8; 32]);
        let bytes = kp.public_key_bytes();
        let pk = KemPublicKey::from_bytes(KemId::X25519MlKem768, &bytes).unwrap();
        assert_eq!(pk.to_bytes(), bytes);

        assert!(KemPublicKey::from_bytes(KemId::X25519MlKem768, &bytes[..100]).is_err());
    }
}
