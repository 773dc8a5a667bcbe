//! OAuth 1.0a request signing (HMAC-SHA1).

use crate::auth::{hmac_sha1, random_token, token::NONCE_BYTES};
use chrono::Utc;

/// Key material for one signed request
#[derive(Clone, Copy)]
pub struct OAuth1Credentials<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    /// Empty when no token is bound yet
    pub token: &'a str,
    pub token_secret: &'a str,
}

impl std::fmt::Debug for OAuth1Credentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

fn encode(value: &str) -> String {
    // urlencoding leaves exactly the RFC 3986 unreserved set untouched
    urlencoding::encode(value).into_owned()
}

/// `METHOD&enc(url)&enc(sorted params)`
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&param_string)
    )
}

pub fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!("{}&{}", encode(consumer_secret), encode(token_secret))
}

/// Build the `Authorization` header value with an explicit nonce and timestamp.
///
/// `extra` holds every other parameter that takes part in the signature:
/// query and form parameters, `oauth_callback`, `oauth_verifier`. Extra
/// parameters prefixed `oauth_` are also echoed in the header.
pub fn authorization_header_with(
    method: &str,
    url: &str,
    creds: OAuth1Credentials<'_>,
    extra: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> String {
    let mut oauth_params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".into(), creds.consumer_key.into()),
        ("oauth_nonce".into(), nonce.into()),
        ("oauth_signature_method".into(), "HMAC-SHA1".into()),
        ("oauth_timestamp".into(), timestamp.into()),
        ("oauth_version".into(), "1.0".into()),
    ];
    if !creds.token.is_empty() {
        oauth_params.push(("oauth_token".into(), creds.token.into()));
    }
    for (k, v) in extra.iter().filter(|(k, _)| k.starts_with("oauth_")) {
        oauth_params.push((k.to_string(), v.to_string()));
    }

    let mut signed = oauth_params.clone();
    for (k, v) in extra.iter().filter(|(k, _)| !k.starts_with("oauth_")) {
        signed.push((k.to_string(), v.to_string()));
    }

    let base = signature_base_string(method, url, &signed);
    let signature = hmac_sha1(&base, &signing_key(creds.consumer_secret, creds.token_secret));
    oauth_params.push(("oauth_signature".into(), signature));
    oauth_params.sort();

    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", fields)
}

/// Build the `Authorization` header value with a fresh nonce and the current time
pub fn authorization_header(
    method: &str,
    url: &str,
    creds: OAuth1Credentials<'_>,
    extra: &[(&str, &str)],
) -> String {
    let nonce = random_token(NONCE_BYTES);
    let timestamp = Utc::now().timestamp().to_string();
    authorization_header_with(method, url, creds, extra, &nonce, &timestamp)
}
