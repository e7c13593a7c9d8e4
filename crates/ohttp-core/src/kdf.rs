//! HKDF-SHA256 helpers, including the labeled variants from RFC 9180

use hkdf::Hkdf;
use sha2::Sha256;

const HPKE_VERSION_LABEL: &[u8] = b"HPKE-v1";

/// HKDF-Extract. Returns the 32-byte pseudorandom key.
pub fn extract(salt: &[u8], ikm: &[u8]) -> [u8; 32] {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    prk.into()
}

/// HKDF-Expand from a raw PRK.
pub fn expand(prk: &[u8; 32], info: &[u8], len: usize) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::from_prk(prk).expect("32 bytes is a valid PRK for HKDF-SHA256");
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .expect("requested length is valid for HKDF-SHA256");
    okm
}

/// `LabeledExtract` from RFC 9180 section 4.
pub fn labeled_extract(suite_id: &[u8], salt: &[u8], label: &str, ikm: &[u8]) -> [u8; 32] {
    let mut labeled_ikm =
        Vec::with_capacity(HPKE_VERSION_LABEL.len() + suite_id.len() + label.len() + ikm.len());
    labeled_ikm.extend_from_slice(HPKE_VERSION_LABEL);
    labeled_ikm.extend_from_slice(suite_id);
    labeled_ikm.extend_from_slice(label.as_bytes());
    labeled_ikm.extend_from_slice(ikm);
    extract(salt, &labeled_ikm)
}

/// `LabeledExpand` from RFC 9180 section 4.
pub fn labeled_expand(
    suite_id: &[u8],
    prk: &[u8; 32],
    label: &str,
    info: &[u8],
    len: usize,
) -> Vec<u8> {
    let mut labeled_info =
        Vec::with_capacity(2 + HPKE_VERSION_LABEL.len() + suite_id.len() + label.len() + info.len());
    labeled_info.extend_from_slice(&(len as u16).to_be_bytes());
    labeled_info.extend_from_slice(HPKE_VERSION_LABEL);
    labeled_info.extend_from_slice(suite_id);
    labeled_info.extend_from_slice(label.as_bytes());
    labeled_info.extend_from_slice(info);
    expand(prk, &labeled_info, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_expand_deterministic() {
        let prk = extract(b"salt", b"input keying material");
        let a = expand(&prk, b"info", 32);
        let b = expand(&prk, b"info", 32);
        assert_eq!(a, b);
        assert_ne!(a, expand(&prk, b"other", 32));
    }

    #[test]
    fn test_labeled_variants_bind_suite() {
        let a = labeled_extract(b"suite-a", b"", "label", b"ikm");
        let b = labeled_extract(b"suite-b", b"", "label", b"ikm");
        assert_ne!(a, b);

        let prk = extract(b"", b"ikm");
        let x = labeled_expand(b"suite-a", &prk, "sec", b"", 16);
        let y = labeled_expand(b"suite-b", &prk, "sec", b"", 16);
        assert_ne!(x, y);
        assert_eq!(x.len(), 16);
    }
}
