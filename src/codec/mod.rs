//! Symmetric encryption of secret strings at rest.
//!
//! Ciphertexts look like `enc:v1:<base64(nonce || ciphertext || tag)>` using
//! AES-256-GCM with a random 96-bit nonce per call, so encrypting the same
//! plaintext twice yields different ciphertexts.
//!
//! The module also owns the masking sentinel: the fixed value handed to the
//! presentation layer in place of a stored secret, and accepted back from it to
//! mean "leave this field unchanged".

pub mod key;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};

pub use key::SecretKey;

/// Masking sentinel standing in for "a secret exists".
pub const SENTINEL: &str = "**********";

/// Prefix identifying codec output.
pub const CIPHERTEXT_PREFIX: &str = "enc:v1:";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The plaintext cannot be encrypted (empty secret).
    #[error("cannot encode secret: {0}")]
    Encoding(String),

    /// The value is not codec output, or was produced with another key.
    #[error("cannot decrypt secret: {0}")]
    Decryption(String),

    /// Key material is missing or malformed.
    #[error("secret key unavailable: {0}")]
    Key(String),
}

/// Returns true if `value` is the masking sentinel.
pub fn is_sentinel(value: &str) -> bool {
    value == SENTINEL
}

/// Returns true if `value` is already codec output and must not be encrypted again.
pub fn is_already_encrypted(value: &str) -> bool {
    decode_payload(value).is_some()
}

fn decode_payload(value: &str) -> Option<Vec<u8>> {
    let encoded = value.strip_prefix(CIPHERTEXT_PREFIX)?;
    let payload = STANDARD.decode(encoded).ok()?;
    (payload.len() >= NONCE_LEN + TAG_LEN).then_some(payload)
}

/// AES-256-GCM codec for secret strings.
#[derive(Clone)]
pub struct SecretCodec {
    cipher: Aes256Gcm,
}

impl SecretCodec {
    /// Create a codec for the given key.
    pub fn new(key: &SecretKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Create a codec from key material (base64 key or passphrase).
    pub fn from_material(material: &str) -> Result<Self, CodecError> {
        Ok(Self::new(&SecretKey::from_material(material)?))
    }

    /// Encrypt a non-empty secret.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        if plaintext.is_empty() {
            return Err(CodecError::Encoding("secret value is empty".to_string()));
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Encoding("encryption failed".to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(format!("{}{}", CIPHERTEXT_PREFIX, STANDARD.encode(payload)))
    }

    /// Decrypt codec output back to the exact plaintext.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError> {
        let payload = decode_payload(ciphertext)
            .ok_or_else(|| CodecError::Decryption("value is not codec output".to_string()))?;
        let (nonce, body) = payload.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| CodecError::Decryption("authentication failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CodecError::Decryption("plaintext is not UTF-8".to_string()))
    }
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SecretCodec {
        SecretCodec::from_material("unit-test-passphrase").unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let codec = codec();
        let long = "x".repeat(4096);
        for secret in ["secret1", "p@ss w0rd!", "ünïcødé 🔑", long.as_str()] {
            let ciphertext = codec.encrypt(secret).unwrap();
            assert_eq!(codec.decrypt(&ciphertext).unwrap(), secret);
        }
    }

    #[test]
    fn test_encryption_is_randomized() {
        let codec = codec();
        let a = codec.encrypt("secret1").unwrap();
        let b = codec.encrypt("secret1").unwrap();
        assert_ne!(a, b);
        assert_eq!(codec.decrypt(&a).unwrap(), codec.decrypt(&b).unwrap());
    }

    #[test]
    fn test_empty_plaintext_rejected() {
        assert!(matches!(codec().encrypt(""), Err(CodecError::Encoding(_))));
    }

    #[test]
    fn test_wrong_key_fails() {
        let ciphertext = codec().encrypt("secret1").unwrap();
        let other = SecretCodec::from_material("some other key").unwrap();
        assert!(matches!(
            other.decrypt(&ciphertext),
            Err(CodecError::Decryption(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let codec = codec();
        let ciphertext = codec.encrypt("secret1").unwrap();
        let mut payload = STANDARD
            .decode(ciphertext.strip_prefix(CIPHERTEXT_PREFIX).unwrap())
            .unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0x01;
        let tampered = format!("{}{}", CIPHERTEXT_PREFIX, STANDARD.encode(payload));
        assert!(codec.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_sentinel_predicates() {
        assert!(is_sentinel(SENTINEL));
        assert_eq!(SENTINEL.len(), 10);
        assert!(!is_sentinel("*********"));
        assert!(!is_sentinel("secret1"));
        assert!(!is_already_encrypted(SENTINEL));
    }

    #[test]
    fn test_already_encrypted_detection() {
        let codec = codec();
        let ciphertext = codec.encrypt("secret1").unwrap();
        assert!(is_already_encrypted(&ciphertext));
        assert!(!is_already_encrypted("secret1"));
        assert!(!is_already_encrypted("enc:v1:not-base64!"));
        assert!(!is_already_encrypted("enc:v1:AAAA"));
    }

    #[test]
    fn test_debug_does_not_leak() {
        assert_eq!(format!("{:?}", codec()), "SecretCodec { .. }");
    }
}
