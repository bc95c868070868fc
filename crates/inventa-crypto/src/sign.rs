use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey};

use crate::Result;
use crate::keys::{private_key_from_base64, public_key_from_base64};

/// Separator between fields of a canonical message. ISO-8601 timestamps
/// contain `:`, so a pipe keeps every field recoverable.
pub const DELIMITER: char = '|';

/// Message signed when a document is registered.
pub fn registration_message(fingerprint: &str, registered_at: &str, owner_id: &str) -> String {
    [fingerprint, registered_at, owner_id].join(&DELIMITER.to_string())
}

/// Message signed each time a proof is issued. Extends the registration
/// message with the issuance time.
pub fn proof_message(
    fingerprint: &str,
    registered_at: &str,
    owner_id: &str,
    generated_at: &str,
) -> String {
    [fingerprint, registered_at, owner_id, generated_at].join(&DELIMITER.to_string())
}

/// ECDSA P-256 over SHA-256 of `message`. Returns base64 of the DER signature.
pub fn sign(message: &str, key: &SigningKey) -> String {
    let signature: Signature = key.sign(message.as_bytes());
    BASE64.encode(signature.to_der().as_bytes())
}

/// Sign with a base64 PKCS#8 private key. Errors when the key is empty or
/// does not parse.
pub fn sign_with_private_key(message: &str, private_key_b64: &str) -> Result<String> {
    let key = private_key_from_base64(private_key_b64)?;
    Ok(sign(message, &key))
}

/// `true` only for a well-formed signature by the holder of `public_key_b64`.
/// Malformed input of any kind yields `false`.
pub fn verify(message: &str, signature_b64: &str, public_key_b64: &str) -> bool {
    let Ok(key) = public_key_from_base64(public_key_b64) else {
        return false;
    };
    let Ok(der) = BASE64.decode(signature_b64.trim()) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&der) else {
        return false;
    };
    key.verify(message.as_bytes(), &signature).is_ok()
}
