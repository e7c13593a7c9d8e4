//! HPKE base-mode key schedule and single-message contexts
//!
//! Contexts are deliberately one-shot: OHTTP seals exactly one request and
//! one response per exchange, so `seal`/`open` refuse a second invocation.

use zeroize::Zeroizing;

use crate::aead;
use crate::error::Error;
use crate::kdf;
use crate::kem::{KemKeyPair, KemPublicKey};
use crate::suite::Suite;

const MODE_BASE: u8 = 0x00;

struct Schedule {
    key: Zeroizing<Vec<u8>>,
    base_nonce: Vec<u8>,
    exporter_secret: Zeroizing<[u8; 32]>,
}

/// `KeySchedule` for base mode, RFC 9180 section 5.1.
fn key_schedule(suite: Suite, shared_secret: &[u8], info: &[u8]) -> Schedule {
    let sid = suite.hpke_suite_id();

    let psk_id_hash = kdf::labeled_extract(&sid, b"", "psk_id_hash", b"");
    let info_hash = kdf::labeled_extract(&sid, b"", "info_hash", info);
    let mut context = Vec::with_capacity(1 + psk_id_hash.len() + info_hash.len());
    context.push(MODE_BASE);
    context.extend_from_slice(&psk_id_hash);
    context.extend_from_slice(&info_hash);

    let secret = kdf::labeled_extract(&sid, shared_secret, "secret", b"");
    let key = Zeroizing::new(kdf::labeled_expand(
        &sid,
        &secret,
        "key",
        &context,
        suite.aead.n_k(),
    ));
    let base_nonce = kdf::labeled_expand(&sid, &secret, "base_nonce", &context, suite.aead.n_n());

    let mut exporter_secret = Zeroizing::new([0u8; 32]);
    exporter_secret
        .copy_from_slice(&kdf::labeled_expand(&sid, &secret, "exp", &context, suite.kdf.n_h()));

    Schedule {
        key,
        base_nonce,
        exporter_secret,
    }
}

/// Sender-side context. Produced by [`setup_sender`] together with the KEM
/// encapsulation to transmit.
pub struct SenderContext {
    suite: Suite,
    schedule: Schedule,
    sealed: bool,
}

/// `SetupBaseS`: encapsulate to `pk` and derive the sending context.
pub fn setup_sender(
    suite: Suite,
    pk: &KemPublicKey,
    info: &[u8],
) -> Result<(Vec<u8>, SenderContext), Error> {
    if pk.kem() != suite.kem {
        return Err(Error::Encapsulation);
    }
    let (shared_secret, enc) = pk.encap()?;
    let schedule = key_schedule(suite, &shared_secret, info);
    Ok((
        enc,
        SenderContext {
            suite,
            schedule,
            sealed: false,
        },
    ))
}

impl SenderContext {
    /// Seal the single message this context exists for.
    pub fn seal(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        if self.sealed {
            return Err(Error::Encapsulation);
        }
        self.sealed = true;
        aead::seal(
            self.suite.aead,
            &self.schedule.key,
            &self.schedule.base_nonce,
            aad,
            plaintext,
        )
    }

    /// `Export` from the context's exporter secret.
    pub fn export(&self, exporter_context: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
        export(self.suite, &self.schedule.exporter_secret, exporter_context, len)
    }

    /// The exporter secret, for handing off to a response-opening context.
    pub(crate) fn exporter_secret(&self) -> [u8; 32] {
        *self.schedule.exporter_secret
    }
}

/// Receiver-side context derived from an encapsulation.
pub struct ReceiverContext {
    suite: Suite,
    schedule: Schedule,
    opened: bool,
}

/// `SetupBaseR`: decapsulate `enc` with the private key and derive the
/// receiving context.
pub fn setup_receiver(
    suite: Suite,
    key_pair: &KemKeyPair,
    enc: &[u8],
    info: &[u8],
) -> Result<ReceiverContext, Error> {
    if key_pair.kem() != suite.kem {
        return Err(Error::Encapsulation);
    }
    let shared_secret = key_pair.decap(enc)?;
    let schedule = key_schedule(suite, &shared_secret, info);
    Ok(ReceiverContext {
        suite,
        schedule,
        opened: false,
    })
}

impl ReceiverContext {
    /// Open the single message this context exists for.
    pub fn open(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        if self.opened {
            return Err(Error::Encapsulation);
        }
        self.opened = true;
        aead::open(
            self.suite.aead,
            &self.schedule.key,
            &self.schedule.base_nonce,
            aad,
            ciphertext,
        )
    }

    /// `Export` from the context's exporter secret.
    pub fn export(&self, exporter_context: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
        export(self.suite, &self.schedule.exporter_secret, exporter_context, len)
    }

    /// The exporter secret, for handing off to a response-sealing context.
    pub(crate) fn exporter_secret(&self) -> [u8; 32] {
        *self.schedule.exporter_secret
    }
}

pub(crate) fn export(
    suite: Suite,
    exporter_secret: &[u8; 32],
    exporter_context: &[u8],
    len: usize,
) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(kdf::labeled_expand(
        &suite.hpke_suite_id(),
        exporter_secret,
        "sec",
        exporter_context,
        len,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{AeadId, KdfId, KemId};

    fn suites() -> Vec<Suite> {
        vec![
            Suite::new(KemId::X25519HkdfSha256, KdfId::HkdfSha256, AeadId::Aes128Gcm),
            Suite::new(KemId::X25519MlKem768, KdfId::HkdfSha256, AeadId::Aes128Gcm),
            Suite::new(KemId::X25519MlKem768, KdfId::HkdfSha256, AeadId::ChaCha20Poly1305),
        ]
    }

    #[test]
    fn test_seal_open_round_trip() {
        for suite in suites() {
            let kp = KemKeyPair::derive(suite.kem, &[5u8; 32]);
            let pk = KemPublicKey::from_bytes(suite.kem, &kp.public_key_bytes()).unwrap();

            let (enc, mut sender) = setup_sender(suite, &pk, b"info").unwrap();
            let ct = sender.seal(b"aad", b"secret message").unwrap();

            let mut receiver = setup_receiver(suite, &kp, &enc, b"info").unwrap();
            let pt = receiver.open(b"aad", &ct).unwrap();
            assert_eq!(pt, b"secret message");
        }
    }

    #[test]
    fn test_info_mismatch_fails_open() {
        let suite = Suite::new(KemId::X25519MlKem768, KdfId::HkdfSha256, AeadId::Aes128Gcm);
        let kp = KemKeyPair::derive(suite.kem, &[5u8; 32]);
        let pk = KemPublicKey::from_bytes(suite.kem, &kp.public_key_bytes()).unwrap();

        let (enc, mut sender) = setup_sender(suite, &pk, b"info-a").unwrap();
        let ct = sender.seal(b"", b"msg").unwrap();

        let mut receiver = setup_receiver(suite, &kp, &enc, b"info-b").unwrap();
        assert!(receiver.open(b"", &ct).is_err());
    }

    #[test]
    fn test_contexts_are_single_use() {
        let suite = Suite::new(KemId::X25519HkdfSha256, KdfId::HkdfSha256, AeadId::Aes128Gcm);
        let kp = KemKeyPair::derive(suite.kem, &[5u8; 32]);
        let pk = KemPublicKey::from_bytes(suite.kem, &kp.public_key_bytes()).unwrap();

        let (enc, mut sender) = setup_sender(suite, &pk, b"").unwrap();
        let ct = sender.seal(b"", b"one").unwrap();
        assert!(sender.seal(b"", b"two").is_err());

        let mut receiver = setup_receiver(suite, &kp, &enc, b"").unwrap();
        receiver.open(b"", &ct).unwrap();
        assert!(receiver.open(b"", &ct).is_err());
    }

    #[test]
    fn test_exporters_agree() {
        let suite = Suite::new(KemId::X25519MlKem768, KdfId::HkdfSha256, AeadId::Aes256Gcm);
        let kp = KemKeyPair::derive(suite.kem, &[8u8; 32]);
        let pk = KemPublicKey::from_bytes(suite.kem, &kp.public_key_bytes()).unwrap();

        let (enc, sender) = setup_sender(suite, &pk, b"info").unwrap();
        let receiver = setup_receiver(suite, &kp, &enc, b"info").unwrap();

        assert_eq!(
            &*sender.export(b"label", 32),
            &*receiver.export(b"label", 32)
        );
        assert_ne!(
            &*sender.export(b"label", 32),
            &*receiver.export(b"other", 32)
        );
    }
}
