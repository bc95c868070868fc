use sha2::{Digest, Sha256};

/// Length of a rendered fingerprint: 256 bits as lowercase hex.
pub const FINGERPRINT_LEN: usize = 64;

/// SHA-256 of `bytes`, rendered as 64 lowercase hex characters.
/// Empty input is valid and hashes like any other.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Canonicalize a typed-in fingerprint: trims whitespace and lowercases.
/// Returns `None` unless the result is exactly [`FINGERPRINT_LEN`] hex digits.
pub fn normalize_fingerprint(input: &str) -> Option<String> {
    let candidate = input.trim().to_ascii_lowercase();
    if candidate.len() == FINGERPRINT_LEN && candidate.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(candidate)
    } else {
        None
    }
}
