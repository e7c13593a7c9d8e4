//! AEAD seal/open dispatch over the configured algorithm

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use chacha20poly1305::ChaCha20Poly1305;

use crate::error::Error;
use crate::suite::AeadId;

/// Encrypt `plaintext` under `key`/`nonce`. Key and nonce lengths must match
/// the algorithm; mismatches surface as [`Error::Encapsulation`].
pub fn seal(
    aead: AeadId,
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    if nonce.len() != aead.n_n() {
        return Err(Error::Encapsulation);
    }
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    match aead {
        AeadId::Aes128Gcm => Aes128Gcm::new_from_slice(key)
            .map_err(|_| Error::Encapsulation)?
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| Error::Encapsulation),
        AeadId::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(|_| Error::Encapsulation)?
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| Error::Encapsulation),
        AeadId::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| Error::Encapsulation)?
            .encrypt(chacha20poly1305::Nonce::from_slice(nonce), payload)
            .map_err(|_| Error::Encapsulation),
    }
}

/// Decrypt and authenticate `ciphertext`. Authentication failure is reported
/// as [`Error::Encapsulation`] with no further detail.
pub fn open(
    aead: AeadId,
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    if nonce.len() != aead.n_n() {
        return Err(Error::Encapsulation);
    }
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    match aead {
        AeadId::Aes128Gcm => Aes128Gcm::new_from_slice(key)
            .map_err(|_| Error::Encapsulation)?
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| Error::Encapsulation),
        AeadId::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(|_| Error::Encapsulation)?
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| Error::Encapsulation),
        AeadId::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| Error::Encapsulation)?
            .decrypt(chacha20poly1305::Nonce::from_slice(nonce), payload)
            .map_err(|_| Error::Encapsulation),
    }
}
