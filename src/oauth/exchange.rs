//! OAuth 2.0 authorization-code exchange.

use super::{ensure_success, FlowError};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Client registration used for the exchange
pub struct ClientCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

/// Exchange an authorization code for the provider's access token
pub async fn exchange_code_for_token(
    http: &reqwest::Client,
    token_url: &str,
    code: &str,
    client: &ClientCredentials<'_>,
) -> Result<String, FlowError> {
    let form = TokenRequest {
        grant_type: "authorization_code",
        code,
        redirect_uri: client.redirect_uri,
        client_id: client.client_id,
        client_secret: client.client_secret,
    };

    debug!(token_url = %token_url, "Exchanging authorization code for token");

    let response = http
        .post(token_url)
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await?;
    ensure_success(&response, "token exchange")?;

    let body = response.text().await?;
    parse_token_response(&body)
}

fn parse_token_response(body: &str) -> Result<String, FlowError> {
    let token: TokenResponse = serde_json::from_str(body)
        .map_err(|e| FlowError::MalformedResponse(format!("token response: {}", e)))?;

    if let Some(error) = token.error {
        return Err(FlowError::TokenExchange(error.to_string()));
    }

    debug!(token_type = ?token.token_type, "Token exchange successful");

    token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FlowError::TokenExchange("no access_token in response".to_string()))
}
