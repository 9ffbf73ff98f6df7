// Cryptographic helpers for the recovery session cookie

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Encryption key size for AES-256 (256 bits)
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Decode a JWT payload without verifying its signature
///
/// Only used to read the `exp` claim of tokens the identity service handed
/// out; the service itself remains the authority on validity.
///
/// # Errors
///
/// Returns an error if:
/// - The JWT format is invalid (not 3 parts separated by dots)
/// - Base64 decoding fails
/// - UTF-8 decoding fails
/// - JSON parsing fails
pub fn decode_jwt_payload(token: &str) -> Result<serde_json::Value, String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid JWT format".to_string());
    }

    let payload_b64 = parts[1];
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| general_purpose::STANDARD.decode(payload_b64))
        .map_err(|_| "Base64 decode failed")?;

    let payload_str = String::from_utf8(payload_bytes).map_err(|_| "UTF-8 decode failed")?;

    serde_json::from_str(&payload_str).map_err(|_| "JSON parse failed".to_string())
}

/// Expiry instant of a JWT, if it has a readable numeric `exp` claim
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = decode_jwt_payload(token).ok()?;
    let exp = payload.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

/// Encrypt any serializable value with AES-256-GCM
///
/// Returns a Base64URL string of nonce + ciphertext.
///
/// # Errors
///
/// Returns an error if:
/// - Serialization fails
/// - Key length is invalid
/// - AES encryption fails
pub fn encrypt_data<T: Serialize>(data: &T, key: &[u8]) -> Result<String> {
    if key.len() != ENCRYPTION_KEY_SIZE {
        return Err(anyhow!(
            "Invalid key length: expected {} bytes, got {}",
            ENCRYPTION_KEY_SIZE,
            key.len()
        ));
    }

    let json_data = serde_json::to_string(data).context("Failed to serialize data")?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(nonce, json_data.as_bytes())
        .map_err(|e| anyhow!("AES encryption failed: {e}"))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&combined))
}

/// Decrypt a value produced by [`encrypt_data`]
///
/// # Errors
///
/// Returns an error if:
/// - Key length is invalid
/// - Base64 decoding fails
/// - Data length is invalid
/// - AES decryption fails (wrong key or tampered data)
/// - Deserialization fails
pub fn decrypt_data<T: DeserializeOwned>(encrypted_data: &str, key: &[u8]) -> Result<T> {
    if key.len() != ENCRYPTION_KEY_SIZE {
        return Err(anyhow!(
            "Invalid key length: expected {} bytes, got {}",
            ENCRYPTION_KEY_SIZE,
            key.len()
        ));
    }

    let combined = general_purpose::URL_SAFE_NO_PAD
        .decode(encrypted_data)
        .context("Failed to decode base64 data")?;

    if combined.len() < NONCE_SIZE {
        return Err(anyhow!("Invalid data length"));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow!("AES decryption failed: {e}"))?;

    serde_json::from_slice(&plaintext).context("Failed to deserialize data from decrypted JSON")
}

/// Stretch or truncate key material to exactly 32 bytes for AES-256
///
/// Session secrets generated by the settings loader are already 32 random
/// bytes; this only matters for short operator-supplied secrets.
#[must_use]
pub fn derive_encryption_key(input_key: &[u8]) -> [u8; ENCRYPTION_KEY_SIZE] {
    let mut encryption_key = [0u8; ENCRYPTION_KEY_SIZE];
    let key_len = std::cmp::min(input_key.len(), ENCRYPTION_KEY_SIZE);
    encryption_key[..key_len].copy_from_slice(&input_key[..key_len]);

    if key_len > 0 && key_len < ENCRYPTION_KEY_SIZE {
        for i in key_len..ENCRYPTION_KEY_SIZE {
            encryption_key[i] =
                encryption_key[i % key_len].wrapping_add(u8::try_from(i % 256).unwrap_or(0));
        }
    }

    encryption_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    fn jwt_with_payload(payload: &serde_json::Value) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let key = derive_encryption_key(b"a test secret that is long enough");
        let sample = Sample {
            name: "recovery".to_string(),
            count: 3,
        };

        let encrypted = encrypt_data(&sample, &key).unwrap();
        assert!(!encrypted.contains("recovery"));

        let decrypted: Sample = decrypt_data(&encrypted, &key).unwrap();
        assert_eq!(decrypted, sample);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let key = derive_encryption_key(b"first secret");
        let other = derive_encryption_key(b"second secret");
        let encrypted = encrypt_data(&json!({"a": 1}), &key).unwrap();

        let result: Result<serde_json::Value> = decrypt_data(&encrypted, &other);
        assert!(result.is_err());
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let key = derive_encryption_key(b"secret");
        let result: Result<serde_json::Value> = decrypt_data("not*base64", &key);
        assert!(result.is_err());

        let result: Result<serde_json::Value> = decrypt_data("AAAA", &key);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        let result = encrypt_data(&json!({}), b"short");
        assert!(result.unwrap_err().to_string().contains("Invalid key length"));
    }

    #[test]
    fn test_derive_key_from_empty_input() {
        assert_eq!(derive_encryption_key(b""), [0u8; ENCRYPTION_KEY_SIZE]);
    }

    #[test]
    fn test_jwt_expiry() {
        let token = jwt_with_payload(&json!({"sub": "user-1", "exp": 1_900_000_000}));
        let expiry = jwt_expiry(&token).unwrap();
        assert_eq!(expiry.timestamp(), 1_900_000_000);

        let token = jwt_with_payload(&json!({"sub": "user-1"}));
        assert!(jwt_expiry(&token).is_none());

        assert!(jwt_expiry("opaque-token").is_none());
    }

    #[test]
    fn test_decode_jwt_payload_errors() {
        assert_eq!(
            decode_jwt_payload("a.b").unwrap_err(),
            "Invalid JWT format".to_string()
        );
        assert!(decode_jwt_payload("a.!!!.c").is_err());
    }
}
