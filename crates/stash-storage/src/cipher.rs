//! Key hashing and value encryption keyed by a backend fingerprint.
//!
//! Keys are hashed with HMAC-SHA256 (lowercase hex) so the physical key is
//! stable for a given fingerprint. Values are sealed with AES-256-GCM under a
//! key derived from the fingerprint with HKDF-SHA256; every seal uses a fresh
//! random nonce, and the blob is `base64(nonce || ciphertext)`.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const VALUE_KEY_INFO: &[u8] = b"stash/value-encryption/v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("key setup failed: {0}")]
    Key(String),
    #[error("encrypt failed: {0}")]
    Encrypt(String),
    #[error("blob decode failed: {0}")]
    Decode(String),
    #[error("decrypt failed: {0}")]
    Decrypt(String),
}

/// HMAC-SHA256 of `text` keyed by `secret`, hex encoded.
pub fn hash_key(text: &str, secret: &str) -> Result<String, CipherError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| CipherError::Key(e.to_string()))?;
    mac.update(text.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Encrypt `text` into an opaque base64 blob.
pub fn seal(text: &str, secret: &str) -> Result<String, CipherError> {
    let cipher = build_cipher(secret)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, text.as_bytes())
        .map_err(|e| CipherError::Encrypt(e.to_string()))?;

    let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    framed.extend_from_slice(nonce.as_slice());
    framed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(framed))
}

/// Inverse of [`seal`]. Fails when the blob is not ours, was tampered with, or
/// was sealed under a different secret.
pub fn open(blob: &str, secret: &str) -> Result<String, CipherError> {
    let framed = STANDARD
        .decode(blob)
        .map_err(|e| CipherError::Decode(e.to_string()))?;
    if framed.len() < NONCE_LEN + TAG_LEN {
        return Err(CipherError::Decode(format!(
            "expected at least {} bytes, got {}",
            NONCE_LEN + TAG_LEN,
            framed.len()
        )));
    }

    let (nonce, ciphertext) = framed.split_at(NONCE_LEN);
    let cipher = build_cipher(secret)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| CipherError::Decrypt(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| CipherError::Decrypt(e.to_string()))
}

fn build_cipher(secret: &str) -> Result<Aes256Gcm, CipherError> {
    let hkdf = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut key = [0u8; 32];
    hkdf.expand(VALUE_KEY_INFO, &mut key)
        .map_err(|e| CipherError::Key(e.to_string()))?;
    Aes256Gcm::new_from_slice(&key).map_err(|e| CipherError::Key(e.to_string()))
}
