//! Authenticated encryption for stored Cloudflare API tokens
//!
//! Tokens are sealed with AES-256-GCM under a key derived from the process
//! secret (`AUTH_SECRET`) and stored as `nonce_hex:tag_hex:data_hex`.

use aes_gcm::{
    aead::{consts::U12, Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("AUTH_SECRET is not configured")]
    Configuration,

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Ciphertext failed authentication")]
    AuthenticationFailure,
}

/// Derive the 32-byte cipher key from the process secret (SHA-256, unsalted)
pub fn derive_key(secret: &str) -> [u8; 32] {
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Encrypts and decrypts API tokens with a key fixed at construction.
///
/// A cipher built without a secret is still constructible so the server can
/// start, but every operation fails with [`CipherError::Configuration`].
#[derive(Clone)]
pub struct TokenCipher {
    key: Option<[u8; 32]>,
}

impl TokenCipher {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.filter(|s| !s.is_empty()).map(derive_key),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    fn cipher(&self) -> Result<Aes256Gcm, CipherError> {
        let key = self.key.as_ref().ok_or(CipherError::Configuration)?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))
    }

    /// Seal `plaintext` under a fresh random nonce
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let cipher = self.cipher()?;
        let nonce: [u8; NONCE_LEN] = rand::random();

        // aes-gcm appends the tag to the ciphertext
        let sealed = cipher
            .encrypt(Nonce::<U12>::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| CipherError::MalformedCiphertext("plaintext too long".to_string()))?;
        let (data, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(data)
        ))
    }

    /// Open a `nonce:tag:data` triple produced by [`TokenCipher::encrypt`]
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let cipher = self.cipher()?;

        let parts: Vec<&str> = ciphertext.split(':').collect();
        let [nonce_hex, tag_hex, data_hex] = parts.as_slice() else {
            return Err(CipherError::MalformedCiphertext(format!(
                "expected 3 parts, found {}",
                parts.len()
            )));
        };

        let nonce = decode_part(nonce_hex, "nonce")?;
        if nonce.len() != NONCE_LEN {
            return Err(CipherError::MalformedCiphertext(format!(
                "nonce must be {} bytes",
                NONCE_LEN
            )));
        }
        let tag = decode_part(tag_hex, "tag")?;
        if tag.len() != TAG_LEN {
            return Err(CipherError::MalformedCiphertext(format!(
                "tag must be {} bytes",
                TAG_LEN
            )));
        }
        let mut sealed = decode_part(data_hex, "data")?;
        sealed.extend_from_slice(&tag);

        let plaintext = cipher
            .decrypt(Nonce::<U12>::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| CipherError::AuthenticationFailure)?;

        String::from_utf8(plaintext)
            .map_err(|_| CipherError::MalformedCiphertext("plaintext is not UTF-8".to_string()))
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher")
            .field("configured", &self.is_configured())
            .finish()
    }
}

fn decode_part(part: &str, name: &str) -> Result<Vec<u8>, CipherError> {
    hex::decode(part)
        .map_err(|e| CipherError::MalformedCiphertext(format!("invalid {} hex: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TokenCipher {
        TokenCipher::new(Some("test-secret-with-enough-entropy"))
    }

    /// Flip one bit of the byte at `index` within hex segment `segment`
    fn tamper(ciphertext: &str, segment: usize, index: usize) -> String {
        let mut parts: Vec<String> = ciphertext.split(':').map(String::from).collect();
        let mut bytes = hex::decode(&parts[segment]).unwrap();
        bytes[index] ^= 0x01;
        parts[segment] = hex::encode(bytes);
        parts.join(":")
    }

    #[test]
    fn test_round_trip() {
        let cipher = cipher();
        for plaintext in ["", "a", "cf-token-0123456789abcdef", "ünïcødé token ✓"] {
            let sealed = cipher.encrypt(plaintext).unwrap();
            assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_ciphertext_format() {
        let sealed = cipher().encrypt("token").unwrap();
        let parts: Vec<&str> = sealed.split(':').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), NONCE_LEN * 2);
        assert_eq!(parts[1].len(), TAG_LEN * 2);
        assert_eq!(parts[2].len(), "token".len() * 2);
        assert!(sealed.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = cipher();
        let first = cipher.encrypt("same token").unwrap();
        let second = cipher.encrypt("same token").unwrap();

        assert_ne!(first, second);
        assert_ne!(first.split(':').next(), second.split(':').next());
    }

    #[test]
    fn test_tampered_tag_is_rejected() {
        let cipher = cipher();
        let sealed = cipher.encrypt("cf-token").unwrap();

        for index in 0..TAG_LEN {
            assert_eq!(
                cipher.decrypt(&tamper(&sealed, 1, index)),
                Err(CipherError::AuthenticationFailure)
            );
        }
    }

    #[test]
    fn test_tampered_data_is_rejected() {
        let cipher = cipher();
        let sealed = cipher.encrypt("cf-token").unwrap();

        for index in 0.."cf-token".len() {
            assert_eq!(
                cipher.decrypt(&tamper(&sealed, 2, index)),
                Err(CipherError::AuthenticationFailure)
            );
        }
    }

    #[test]
    fn test_tampered_nonce_is_rejected() {
        let cipher = cipher();
        let sealed = cipher.encrypt("cf-token").unwrap();

        assert_eq!(
            cipher.decrypt(&tamper(&sealed, 0, 3)),
            Err(CipherError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let sealed = cipher().encrypt("cf-token").unwrap();
        let other = TokenCipher::new(Some("a-different-secret"));

        assert_eq!(
            other.decrypt(&sealed),
            Err(CipherError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_wrong_part_count_is_malformed() {
        let cipher = cipher();
        for input in ["", "abcd", "aa:bb", "aa:bb:cc:dd"] {
            assert!(matches!(
                cipher.decrypt(input),
                Err(CipherError::MalformedCiphertext(_))
            ));
        }
    }

    #[test]
    fn test_bad_hex_is_malformed() {
        let cipher = cipher();
        let sealed = cipher.encrypt("cf-token").unwrap();
        let mut parts: Vec<&str> = sealed.split(':').collect();
        parts[2] = "zz";

        assert!(matches!(
            cipher.decrypt(&parts.join(":")),
            Err(CipherError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_short_nonce_is_malformed() {
        let cipher = cipher();
        let sealed = cipher.encrypt("cf-token").unwrap();
        let truncated = &sealed[2..];

        assert!(matches!(
            cipher.decrypt(truncated),
            Err(CipherError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_missing_secret_fails_every_call() {
        for cipher in [TokenCipher::new(None), TokenCipher::new(Some(""))] {
            assert!(!cipher.is_configured());
            assert_eq!(cipher.encrypt("token"), Err(CipherError::Configuration));
            assert_eq!(
                cipher.decrypt("00:00:00"),
                Err(CipherError::Configuration)
            );
        }
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        assert_eq!(derive_key("secret"), derive_key("secret"));
        assert_ne!(derive_key("secret"), derive_key("Secret"));
    }
}
