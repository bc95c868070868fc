/// Inventa Crypto Library
///
/// Ownership-proof primitives:
/// - SHA-256 document fingerprints
/// - AES-256-GCM content encryption and key wrapping
/// - NIST P-256 key pairs, wrapped at rest under a password-derived key
/// - ECDSA P-256 / SHA-256 signatures over canonical registration messages

pub mod encrypt;
pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use error::CryptoError;

pub type Result<T> = std::result::Result<T, CryptoError>;
