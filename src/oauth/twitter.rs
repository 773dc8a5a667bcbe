//! Twitter: OAuth 1.0a three-legged flow.
//!
//! The temporary request token doubles as the state value: it is stored in
//! the `oauthstate` cookie and Twitter echoes it back as `oauth_token`.

use super::oauth1::{authorization_header, OAuth1Credentials};
use super::{
    ensure_success, identity_from_profile, AuthRedirect, CallbackParams, ExternalIdentity,
    FlowError, IdentityProvider, ProviderToken,
};
use crate::config::TwitterConfig;
use crate::users::Provider;
use async_trait::async_trait;
use serde::Deserialize;

/// Form-encoded body of the request-token and access-token endpoints
#[derive(Deserialize)]
struct TokenPair {
    oauth_token: String,
    #[serde(default)]
    oauth_token_secret: String,
}

fn parse_token_pair(body: &str, step: &str) -> Result<TokenPair, FlowError> {
    let pair: TokenPair = serde_urlencoded::from_str(body)
        .map_err(|e| FlowError::MalformedResponse(format!("{}: {}", step, e)))?;
    if pair.oauth_token.is_empty() {
        return Err(FlowError::MalformedResponse(format!(
            "{}: empty oauth_token",
            step
        )));
    }
    Ok(pair)
}

pub struct TwitterProvider {
    config: TwitterConfig,
}

impl TwitterProvider {
    pub fn new(config: TwitterConfig) -> Self {
        Self { config }
    }

    fn credentials<'a>(&'a self, token: &'a str, token_secret: &'a str) -> OAuth1Credentials<'a> {
        OAuth1Credentials {
            consumer_key: &self.config.consumer_key,
            consumer_secret: &self.config.consumer_secret,
            token,
            token_secret,
        }
    }

    /// The request-token secret is not kept between the two legs (only the
    /// token rides in the state cookie), so the access-token call is signed
    /// with an empty token secret.
    fn access_token_credentials<'a>(&'a self, request_token: &'a str) -> OAuth1Credentials<'a> {
        self.credentials(request_token, "")
    }
}

#[async_trait]
impl IdentityProvider for TwitterProvider {
    fn provider(&self) -> Provider {
        Provider::Twitter
    }

    fn returned_state<'a>(&self, params: &'a CallbackParams) -> Option<&'a str> {
        params.oauth_token.as_deref()
    }

    async fn authorization(&self, http: &reqwest::Client) -> Result<AuthRedirect, FlowError> {
        let url = &self.config.request_token_url;
        let header = authorization_header(
            "POST",
            url,
            self.credentials(&self.config.token_key, &self.config.token_secret),
            &[("oauth_callback", self.config.redirect_url.as_str())],
        );

        let response = http
            .post(url)
            .header("Authorization", header)
            .send()
            .await?;
        ensure_success(&response, "request token")?;

        let body = response.text().await?;
        let request_token = parse_token_pair(&body, "request token")?;

        let separator = if self.config.authorize_url.contains('?') { '&' } else { '?' };
        Ok(AuthRedirect {
            url: format!(
                "{}{}oauth_token={}",
                self.config.authorize_url,
                separator,
                urlencoding::encode(&request_token.oauth_token)
            ),
            state: request_token.oauth_token,
        })
    }

    async fn exchange(
        &self,
        http: &reqwest::Client,
        params: &CallbackParams,
    ) -> Result<ProviderToken, FlowError> {
        let request_token = params.oauth_token.as_deref().ok_or(FlowError::MissingState)?;
        let verifier = params
            .oauth_verifier
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(FlowError::MissingCode)?;

        let url = &self.config.access_token_url;
        let header = authorization_header(
            "POST",
            url,
            self.access_token_credentials(request_token),
            &[("oauth_verifier", verifier)],
        );

        let response = http
            .post(url)
            .header("Authorization", header)
            .send()
            .await?;
        ensure_success(&response, "access token")?;

        let body = response.text().await?;
        let access = parse_token_pair(&body, "access token")?;
        Ok(ProviderToken::OAuth1 {
            token: access.oauth_token,
            secret: access.oauth_token_secret,
        })
    }

    async fn fetch_identity(
        &self,
        http: &reqwest::Client,
        token: &ProviderToken,
    ) -> Result<ExternalIdentity, FlowError> {
        let ProviderToken::OAuth1 { token, secret } = token else {
            return Err(FlowError::TokenExchange(
                "expected an OAuth1 token pair".to_string(),
            ));
        };

        let url = &self.config.verify_credentials_url;
        let header = authorization_header("GET", url, self.credentials(token, secret), &[]);

        let response = http
            .get(url)
            .header("Authorization", header)
            .send()
            .await?;
        ensure_success(&response, "verify credentials")?;

        let body = response.text().await?;
        identity_from_profile(Provider::Twitter, &body, "errors", "id_str", "name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(base: &str) -> TwitterConfig {
        TwitterConfig {
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            token_key: "tk".to_string(),
            token_secret: "ts".to_string(),
            redirect_url: "http://localhost:8080/auth/callback/twitter".to_string(),
            request_token_url: format!("{}/oauth/request_token", base),
            authorize_url: format!("{}/oauth/authenticate", base),
            access_token_url: format!("{}/oauth/access_token", base),
            verify_credentials_url: format!("{}/1.1/account/verify_credentials.json", base),
        }
    }

    #[tokio::test]
    async fn test_authorization_uses_request_token_as_state() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/request_token")
            .match_header("authorization", Matcher::Regex(r#"^OAuth .*oauth_callback=""#.into()))
            .with_body("oauth_token=req-token&oauth_token_secret=req-secret&oauth_callback_confirmed=true")
            .create_async()
            .await;

        let provider = TwitterProvider::new(config(&server.url()));
        let redirect = provider.authorization(&reqwest::Client::new()).await.unwrap();

        assert_eq!(redirect.state, "req-token");
        assert_eq!(
            redirect.url,
            format!("{}/oauth/authenticate?oauth_token=req-token", server.url())
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_token_failure_aborts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/request_token")
            .with_status(401)
            .create_async()
            .await;

        let provider = TwitterProvider::new(config(&server.url()));
        let result = provider.authorization(&reqwest::Client::new()).await;
        assert_eq!(
            result,
            Err(FlowError::UnexpectedStatus {
                step: "request token",
                status: 401
            })
        );
    }

    #[test]
    fn test_access_token_signed_without_token_secret() {
        let provider = TwitterProvider::new(config("https://api.twitter.test"));
        let creds = provider.access_token_credentials("req-token");
        assert_eq!(creds.token, "req-token");
        assert_eq!(creds.token_secret, "");
        assert_eq!(
            crate::oauth::oauth1::signing_key(creds.consumer_secret, creds.token_secret),
            format!("{}&", urlencoding::encode(&provider.config.consumer_secret))
        );
    }

    #[tokio::test]
    async fn test_exchange_and_verify() {
        let mut server = mockito::Server::new_async().await;
        let access = server
            .mock("POST", "/oauth/access_token")
            .match_header(
                "authorization",
                Matcher::Regex(r#"oauth_verifier="v3rifier""#.into()),
            )
            .with_body("oauth_token=user-token&oauth_token_secret=user-secret&user_id=42&screen_name=ada")
            .create_async()
            .await;
        let verify = server
            .mock("GET", "/1.1/account/verify_credentials.json")
            .match_header(
                "authorization",
                Matcher::Regex(r#"oauth_token="user-token""#.into()),
            )
            .with_body(r#"{"id": 42, "id_str": "42", "name": "Ada", "screen_name": "ada"}"#)
            .create_async()
            .await;

        let provider = TwitterProvider::new(config(&server.url()));
        let http = reqwest::Client::new();
        let params = CallbackParams {
            oauth_token: Some("req-token".to_string()),
            oauth_verifier: Some("v3rifier".to_string()),
            ..Default::default()
        };

        let token = provider.exchange(&http, &params).await.unwrap();
        assert_eq!(
            token,
            ProviderToken::OAuth1 {
                token: "user-token".to_string(),
                secret: "user-secret".to_string()
            }
        );

        let identity = provider.fetch_identity(&http, &token).await.unwrap();
        assert_eq!(identity.provider, Provider::Twitter);
        assert_eq!(identity.external_id, "42");
        assert_eq!(identity.display_name, "Ada");

        access.assert_async().await;
        verify.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_verifier_aborts() {
        let provider = TwitterProvider::new(config("http://127.0.0.1:9"));
        let params = CallbackParams {
            oauth_token: Some("req-token".to_string()),
            ..Default::default()
        };
        let result = provider.exchange(&reqwest::Client::new(), &params).await;
        assert_eq!(result, Err(FlowError::MissingCode));
    }

    #[tokio::test]
    async fn test_verify_errors_field_aborts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/1.1/account/verify_credentials.json")
            .with_body(r#"{"errors": [{"code": 89, "message": "Invalid or expired token."}]}"#)
            .create_async()
            .await;

        let provider = TwitterProvider::new(config(&server.url()));
        let token = ProviderToken::OAuth1 {
            token: "t".into(),
            secret: "s".into(),
        };
        let result = provider
            .fetch_identity(&reqwest::Client::new(), &token)
            .await;
        assert!(matches!(result, Err(FlowError::ProviderError(_))));
    }

    #[test]
    fn test_parse_token_pair_rejects_garbage() {
        assert!(parse_token_pair("not a token", "request token").is_err());
        assert!(parse_token_pair("oauth_token=&oauth_token_secret=x", "request token").is_err());
    }
}
