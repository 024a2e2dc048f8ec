//! Password-based encryption envelope for database images
//!
//! Layout: `salt (16) | iv (12) | AES-256-GCM ciphertext+tag`. The key is
//! PBKDF2-HMAC-SHA256 over the password and salt, 100,000 iterations.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Error, Result};

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// GCM authentication tag appended to the ciphertext
const TAG_LEN: usize = 16;

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypt `plaintext` under `password` with a fresh salt and iv
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| Error::Crypto)?;

    let mut envelope = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    envelope.extend_from_slice(&salt);
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Decrypt an envelope. Any failure is the same generic `Error::Crypto`.
pub fn decrypt(envelope: &[u8], password: &str) -> Result<Vec<u8>> {
    if envelope.len() < SALT_LEN + IV_LEN + TAG_LEN {
        return Err(Error::Crypto);
    }
    let (salt, rest) = envelope.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let key = derive_key(password, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| Error::Crypto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let blob = b"SQLite format 3\0 and then some pages".to_vec();
        let sealed = encrypt(&blob, "hunter2").unwrap();
        assert_eq!(sealed.len(), SALT_LEN + IV_LEN + blob.len() + TAG_LEN);
        assert_eq!(decrypt(&sealed, "hunter2").unwrap(), blob);
    }

    #[test]
    fn test_fresh_salt_and_iv_each_time() {
        let a = encrypt(b"same", "pw").unwrap();
        let b = encrypt(b"same", "pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_password_is_generic_error() {
        let sealed = encrypt(b"ledger bytes", "right").unwrap();
        let err = decrypt(&sealed, "wrong").unwrap_err();
        assert!(matches!(err, Error::Crypto));
        assert_eq!(err.to_string(), "incorrect password or corrupted data");
    }

    #[test]
    fn test_tampered_or_truncated_envelope_fails_closed() {
        let mut sealed = encrypt(b"ledger bytes", "pw").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(decrypt(&sealed, "pw"), Err(Error::Crypto)));
        assert!(matches!(decrypt(&sealed[..20], "pw"), Err(Error::Crypto)));
    }
}
