use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::{CryptoError, Result};

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Ciphertext (with appended GCM tag) and the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

impl SealedBox {
    /// `(ciphertext, nonce)` as base64 for transport.
    pub fn to_base64(&self) -> (String, String) {
        (BASE64.encode(&self.ciphertext), BASE64.encode(self.nonce))
    }

    pub fn from_base64(ciphertext: &str, nonce: &str) -> Result<Self> {
        let ciphertext = BASE64.decode(ciphertext)?;
        let nonce = nonce_from_slice(&BASE64.decode(nonce)?)?;
        Ok(Self { ciphertext, nonce })
    }

    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8]) -> Result<Self> {
        Ok(Self {
            ciphertext,
            nonce: nonce_from_slice(nonce)?,
        })
    }
}

/// Encrypt `plaintext` with AES-256-GCM under a fresh random nonce.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<SealedBox> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    Ok(SealedBox {
        ciphertext,
        nonce: nonce_bytes,
    })
}

/// Decrypt a [`SealedBox`]. Any tampering with the ciphertext, tag or nonce
/// is an error; no partial plaintext is ever returned.
pub fn decrypt(key: &[u8; 32], sealed: &SealedBox) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let nonce = Nonce::from_slice(&sealed.nonce);

    cipher
        .decrypt(nonce, sealed.ciphertext.as_slice())
        .map_err(|_| CryptoError::Decrypt)
}

fn nonce_from_slice(bytes: &[u8]) -> Result<[u8; NONCE_LEN]> {
    bytes.try_into().map_err(|_| CryptoError::NonceLength {
        expected: NONCE_LEN,
        actual: bytes.len(),
    })
}
