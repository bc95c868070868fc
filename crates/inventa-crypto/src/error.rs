use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed: authentication tag mismatch")]
    Decrypt,

    #[error("Invalid nonce length: expected {expected} bytes, got {actual}")]
    NonceLength { expected: usize, actual: usize },

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("Private key is missing")]
    MissingPrivateKey,

    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}
