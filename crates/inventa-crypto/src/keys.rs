use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use argon2::Argon2;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use zeroize::Zeroizing;

use crate::encrypt::{self, SealedBox};
use crate::{CryptoError, Result};

/// Salt length for the password-derived key-wrapping key.
pub const SALT_LEN: usize = 16;

/// Generate a random 256-bit key for AES-256-GCM.
/// One key per document; never reused. Wiped on drop.
pub fn generate_document_key() -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut *key);
    key
}

fn key_from_slice(bytes: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    if bytes.len() != 32 {
        return Err(CryptoError::KeyLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(bytes);
    Ok(key)
}

// -- Signing key pairs --

/// A freshly generated P-256 key pair. The public half is already encoded
/// (base64 of DER SubjectPublicKeyInfo) since that is how it is stored and
/// published.
pub struct UserKeyPair {
    pub signing_key: SigningKey,
    pub public_key: String,
}

/// Generate a new P-256 key pair from the OS RNG.
pub fn generate_keypair() -> Result<UserKeyPair> {
    let signing_key = SigningKey::random(&mut OsRng);
    let public_key = public_key_to_base64(signing_key.verifying_key())?;
    Ok(UserKeyPair {
        signing_key,
        public_key,
    })
}

pub fn public_key_to_base64(key: &VerifyingKey) -> Result<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    Ok(BASE64.encode(der.as_bytes()))
}

pub fn public_key_from_base64(encoded: &str) -> Result<VerifyingKey> {
    let der = BASE64.decode(encoded.trim())?;
    VerifyingKey::from_public_key_der(&der).map_err(|e| CryptoError::MalformedKey(e.to_string()))
}

/// PKCS#8 DER, base64. Only used for wrapping and for callers that hold
/// their own key material.
pub fn private_key_to_base64(key: &SigningKey) -> Result<String> {
    let der = key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    Ok(BASE64.encode(der.as_bytes()))
}

pub fn private_key_from_base64(encoded: &str) -> Result<SigningKey> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(CryptoError::MissingPrivateKey);
    }
    let der = BASE64.decode(encoded)?;
    SigningKey::from_pkcs8_der(&der).map_err(|e| CryptoError::MalformedKey(e.to_string()))
}

// -- Key wrapping --

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the 256-bit key-wrapping key from a password with Argon2id.
pub fn derive_wrapping_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let mut out = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut *out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// Seal a signing key's PKCS#8 encoding under the key-wrapping key.
pub fn wrap_signing_key(key: &SigningKey, wrapping_key: &[u8; 32]) -> Result<SealedBox> {
    let der = key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    encrypt::encrypt(wrapping_key, der.as_bytes())
}

/// Fails with [`CryptoError::Decrypt`] when the wrapping key is wrong.
pub fn unwrap_signing_key(sealed: &SealedBox, wrapping_key: &[u8; 32]) -> Result<SigningKey> {
    let der = Zeroizing::new(encrypt::decrypt(wrapping_key, sealed)?);
    SigningKey::from_pkcs8_der(&der).map_err(|e| CryptoError::MalformedKey(e.to_string()))
}

pub fn wrap_document_key(key: &[u8; 32], wrapping_key: &[u8; 32]) -> Result<SealedBox> {
    encrypt::encrypt(wrapping_key, key)
}

pub fn unwrap_document_key(
    sealed: &SealedBox,
    wrapping_key: &[u8; 32],
) -> Result<Zeroizing<[u8; 32]>> {
    let bytes = Zeroizing::new(encrypt::decrypt(wrapping_key, sealed)?);
    key_from_slice(&bytes)
}
