//! Sign-in through external identity providers.
//!
//! Every provider follows the same shape:
//! 1. `begin`: mint a state value, remember it in the `oauthstate` cookie,
//!    redirect the browser to the provider
//! 2. The provider redirects back to `/auth/callback/:provider`
//! 3. `complete`: check the returned state against the cookie, exchange the
//!    callback artifact for a provider token, fetch the profile
//!
//! Providers only supply the wire-specific steps through [`IdentityProvider`];
//! state correlation lives here once. Failures come back as a tagged
//! [`FlowError`] and the HTTP layer decides how to present them.

mod exchange;
pub mod oauth1;
pub mod oauth2;
pub mod state;
pub mod twitter;

pub use oauth2::OAuth2Provider;
pub use twitter::TwitterProvider;

use crate::config::ForumConfig;
use crate::users::Provider;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Provider-independent result of a successful sign-in
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalIdentity {
    pub provider: Provider,
    /// Provider-scoped user id, stored as the local login
    pub external_id: String,
    pub display_name: String,
}

/// Why a sign-in flow was abandoned
#[derive(Debug, Clone, PartialEq)]
pub enum FlowError {
    ProviderDisabled(Provider),
    /// The provider reported that the user declined or the request was invalid
    ProviderDenied(String),
    MissingStateCookie,
    MissingState,
    StateMismatch,
    MissingCode,
    Transport(String),
    UnexpectedStatus { step: &'static str, status: u16 },
    TokenExchange(String),
    MalformedResponse(String),
    /// The profile body carried the provider's error marker
    ProviderError(String),
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowError::ProviderDisabled(p) => write!(f, "Provider '{}' is not configured", p),
            FlowError::ProviderDenied(reason) => write!(f, "Provider denied sign-in: {}", reason),
            FlowError::MissingStateCookie => write!(f, "No state cookie on callback"),
            FlowError::MissingState => write!(f, "Callback carries no state"),
            FlowError::StateMismatch => write!(f, "Callback state does not match cookie"),
            FlowError::MissingCode => write!(f, "Callback carries no authorization code"),
            FlowError::Transport(e) => write!(f, "Provider request failed: {}", e),
            FlowError::UnexpectedStatus { step, status } => {
                write!(f, "Provider answered {} during {}", status, step)
            }
            FlowError::TokenExchange(e) => write!(f, "Token exchange failed: {}", e),
            FlowError::MalformedResponse(e) => write!(f, "Malformed provider response: {}", e),
            FlowError::ProviderError(e) => write!(f, "Provider reported an error: {}", e),
        }
    }
}

impl std::error::Error for FlowError {}

impl From<reqwest::Error> for FlowError {
    fn from(e: reqwest::Error) -> Self {
        FlowError::Transport(e.to_string())
    }
}

/// Query string of `/auth/callback/:provider`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    /// Twitter's "user pressed cancel" marker
    pub denied: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Credential the provider hands back for the profile call
#[derive(Clone, PartialEq)]
pub enum ProviderToken {
    Bearer(String),
    OAuth1 { token: String, secret: String },
}

impl std::fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderToken::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            ProviderToken::OAuth1 { .. } => f.write_str("OAuth1(<redacted>)"),
        }
    }
}

/// Where to send the browser and which state value to remember
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRedirect {
    pub url: String,
    pub state: String,
}

/// Provider-specific steps of the sign-in flow
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// The callback parameter that must equal the stored state
    fn returned_state<'a>(&self, params: &'a CallbackParams) -> Option<&'a str>;

    async fn authorization(&self, http: &reqwest::Client) -> Result<AuthRedirect, FlowError>;

    async fn exchange(
        &self,
        http: &reqwest::Client,
        params: &CallbackParams,
    ) -> Result<ProviderToken, FlowError>;

    async fn fetch_identity(
        &self,
        http: &reqwest::Client,
        token: &ProviderToken,
    ) -> Result<ExternalIdentity, FlowError>;
}

/// Start a sign-in: the redirect target plus the state to store in the cookie
pub async fn begin(
    provider: &dyn IdentityProvider,
    http: &reqwest::Client,
) -> Result<AuthRedirect, FlowError> {
    let redirect = provider.authorization(http).await?;
    debug!(provider = %provider.provider(), "Authorization redirect prepared");
    Ok(redirect)
}

/// Finish a sign-in from the callback parameters and the stored state.
///
/// Nothing is sent to the provider unless the returned state equals the
/// stored one byte for byte.
pub async fn complete(
    provider: &dyn IdentityProvider,
    http: &reqwest::Client,
    params: &CallbackParams,
    stored_state: Option<&str>,
) -> Result<ExternalIdentity, FlowError> {
    if let Some(error) = &params.error {
        let reason = match &params.error_description {
            Some(description) => format!("{} ({})", error, description),
            None => error.clone(),
        };
        return Err(FlowError::ProviderDenied(reason));
    }
    if params.denied.is_some() {
        return Err(FlowError::ProviderDenied("access denied".to_string()));
    }

    let stored = stored_state.ok_or(FlowError::MissingStateCookie)?;
    let returned = provider
        .returned_state(params)
        .filter(|s| !s.is_empty())
        .ok_or(FlowError::MissingState)?;
    if returned.as_bytes() != stored.as_bytes() {
        return Err(FlowError::StateMismatch);
    }

    let token = provider.exchange(http, params).await?;
    let identity = provider.fetch_identity(http, &token).await?;
    debug!(
        provider = %identity.provider,
        external_id = %identity.external_id,
        "External identity resolved"
    );
    Ok(identity)
}

/// Fail with `UnexpectedStatus` unless the provider answered 2xx
pub(crate) fn ensure_success(
    response: &reqwest::Response,
    step: &'static str,
) -> Result<(), FlowError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FlowError::UnexpectedStatus {
            step,
            status: status.as_u16(),
        });
    }
    Ok(())
}

/// Build an [`ExternalIdentity`] from a JSON profile body.
///
/// The body must not carry `error_key`, and must carry a non-empty id
/// (string or number) under `id_key` and a string under `name_key`.
pub(crate) fn identity_from_profile(
    provider: Provider,
    body: &str,
    error_key: &str,
    id_key: &str,
    name_key: &str,
) -> Result<ExternalIdentity, FlowError> {
    let profile: Value = serde_json::from_str(body)
        .map_err(|e| FlowError::MalformedResponse(format!("profile is not JSON: {}", e)))?;

    if let Some(error) = profile.get(error_key).filter(|v| !v.is_null()) {
        return Err(FlowError::ProviderError(error.to_string()));
    }

    let external_id = match profile.get(id_key) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return Err(FlowError::MalformedResponse(format!(
                "profile has no '{}'",
                id_key
            )))
        }
    };
    let display_name = profile
        .get(name_key)
        .and_then(Value::as_str)
        .ok_or_else(|| FlowError::MalformedResponse(format!("profile has no '{}'", name_key)))?
        .to_string();

    Ok(ExternalIdentity {
        provider,
        external_id,
        display_name,
    })
}

/// Configured providers, keyed by name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every provider whose credentials are configured
    pub fn from_config(config: &ForumConfig) -> Self {
        let mut registry = Self::new();
        if config.google.is_enabled() {
            registry.insert(Arc::new(OAuth2Provider::google(config.google.clone())));
        }
        if config.facebook.is_enabled() {
            registry.insert(Arc::new(OAuth2Provider::facebook(config.facebook.clone())));
        }
        if config.twitter.is_enabled() {
            registry.insert(Arc::new(TwitterProvider::new(config.twitter.clone())));
        }
        registry
    }

    pub fn insert(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.provider(), provider);
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<dyn IdentityProvider>, FlowError> {
        self.providers
            .get(&provider)
            .cloned()
            .ok_or(FlowError::ProviderDisabled(provider))
    }

    /// Enabled providers in display order
    pub fn enabled(&self) -> Vec<Provider> {
        Provider::OAUTH
            .into_iter()
            .filter(|p| self.providers.contains_key(p))
            .collect()
    }
}
