use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

pub mod signature;
pub mod token;

pub use signature::{hmac_sha1, hmac_sha256, CredentialHasher};
pub use token::random_token;


/// Cookie carrying the raw session access token
pub const SESSION_COOKIE: &str = "UAAT";

/// Header carrying the raw API key for programmatic clients
pub const API_KEY_HEADER: &str = "APIKey";

/// Raw bearer credential presented by a client.
///
/// Never persisted; only its hash is compared against the user table.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    /// Access token from the session cookie
    SessionToken(String),
    /// Long-lived key from the `APIKey` header
    ApiKey(String),
}

impl Credential {
    pub fn raw(&self) -> &str {
        match self {
            Credential::SessionToken(raw) | Credential::ApiKey(raw) => raw,
        }
    }
}

/// Extract the client's credential from request headers
///
/// A non-empty session cookie wins; the `APIKey` header is only consulted
/// when no session cookie is present.
pub fn extract_credential(headers: &HeaderMap) -> Result<Credential, TokenError> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Ok(Credential::SessionToken(value.to_string()));
        }
    }

    extract_api_key(headers).map(Credential::ApiKey)
}

/// Extract the raw API key from the `APIKey` header
pub fn extract_api_key(headers: &HeaderMap) -> Result<String, TokenError> {
    let value = headers
        .get(API_KEY_HEADER)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?
        .trim();

    if value.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(value.to_string())
}

/// Credential extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Neither a session cookie nor an API key header is present
    Missing,
    /// Header value is not visible ASCII
    InvalidFormat,
    /// Credential is an empty string
    Empty,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Missing => write!(f, "No credential provided"),
            TokenError::InvalidFormat => write!(f, "Invalid credential format"),
            TokenError::Empty => write!(f, "Credential is empty"),
        }
    }
}

impl std::error::Error for TokenError {}
