//! Keyed message signatures.
//!
//! `hmac_sha1` backs OAuth1 request signing (the protocol fixes the
//! algorithm). `CredentialHasher` turns raw bearer secrets into the values
//! stored on the user row so the secrets themselves are never persisted.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA1 of `message` under `key`, base64 encoded.
pub fn hmac_sha1(message: &str, key: &str) -> String {
    // HMAC accepts keys of any length, including empty
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// HMAC-SHA256 of `message` under `key`, base64 encoded.
pub fn hmac_sha256(message: &str, key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Hashes raw access tokens and API keys with the process-wide hashing key.
///
/// Injected into the identity resolver and the account reconciler so both
/// sides of a lookup always agree on the key.
#[derive(Clone)]
pub struct CredentialHasher {
    key: String,
}

impl CredentialHasher {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Stored form of a raw credential
    pub fn hash(&self, raw: &str) -> String {
        hmac_sha256(raw, &self.key)
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("key", &"<redacted>")
            .finish()
    }
}
