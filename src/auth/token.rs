use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};

/// Bytes of entropy in a CSRF state value
pub const STATE_TOKEN_BYTES: usize = 32;

/// Bytes of entropy in an OAuth1 nonce
pub const NONCE_BYTES: usize = 32;

/// Bytes of entropy in a session access token or API key
pub const ACCESS_TOKEN_BYTES: usize = 64;

/// Generate an opaque random token of `byte_len` bytes from the OS CSPRNG.
///
/// URL-safe base64 without padding, so it can travel in cookies, headers and
/// query strings unescaped.
pub fn random_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Fresh session access token or API key
pub fn access_token() -> String {
    random_token(ACCESS_TOKEN_BYTES)
}
