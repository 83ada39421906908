//! Cryptographic primitives: HMAC-SHA256, base64url, constant-time compare
//! and CSPRNG-backed material. Higher layers build the token codec and the
//! key registry on top of these.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Unambiguous alphabet for codes a human may have to type (no 0/O, 1/I/L).
pub const HUMAN_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// HMAC-SHA256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Hex-encoded HMAC-SHA256 of a single UTF-8 value.
pub fn hmac_sha256_hex(key: &[u8], value: &str) -> String {
    hex::encode(hmac_sha256(key, &[value.as_bytes()]))
}

/// Constant-time byte comparison. Length is not secret.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn b64url_decode(s: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(s).ok()
}

/// `len` bytes from the OS CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// base64url string carrying `byte_len` bytes of entropy (32 bytes -> 43 chars).
pub fn random_token(byte_len: usize) -> String {
    b64url_encode(&random_bytes(byte_len))
}

/// Random code drawn from [`HUMAN_ALPHABET`].
pub fn random_human_code(len: usize) -> String {
    (0..len)
        .map(|_| HUMAN_ALPHABET[OsRng.gen_range(0..HUMAN_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_is_keyed_and_deterministic() {
        let a = hmac_sha256(b"k1", &[b"hello"]);
        let b = hmac_sha256(b"k1", &[b"hel", b"lo"]);
        let c = hmac_sha256(b"k2", &[b"hello"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(hmac_sha256_hex(b"k1", "hello").len(), 64);
    }

    #[test]
    fn ct_eq_handles_lengths() {
        assert!(ct_eq(b"abc", b"abc"));
        assert!(!ct_eq(b"abc", b"abd"));
        assert!(!ct_eq(b"abc", b"abcd"));
    }

    #[test]
    fn random_token_has_expected_shape() {
        let t = random_token(32);
        assert_eq!(t.len(), 43);
        assert!(b64url_decode(&t).is_some());
        assert_ne!(t, random_token(32));
    }

    #[test]
    fn human_code_uses_alphabet() {
        let code = random_human_code(12);
        assert_eq!(code.len(), 12);
        assert!(code.bytes().all(|c| HUMAN_ALPHABET.contains(&c)));
    }
}
