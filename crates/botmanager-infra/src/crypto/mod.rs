//! API key material: generation and SHA-256 hashing.
//!
//! Only the hash of a key is ever persisted; the plaintext is shown to the
//! operator once when the key is issued.

use aes_gcm::aead::{OsRng, rand_core::RngCore};
use sha2::{Digest, Sha256};

/// Prefix carried by every issued key.
pub const API_KEY_PREFIX: &str = "bmgr_";

/// Generate a new random API key (`bmgr_` followed by 64 hex chars).
pub fn generate_api_key() -> String {
    let mut key_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut key_bytes);
    format!(
        "{API_KEY_PREFIX}{}",
        key_bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
    )
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}
