use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete forum configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default = "OAuth2ProviderConfig::google_defaults")]
    pub google: OAuth2ProviderConfig,
    #[serde(default = "OAuth2ProviderConfig::facebook_defaults")]
    pub facebook: OAuth2ProviderConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
}

/// HTTP listener and storage locations
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_database_path() -> String {
    "forum.db".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            database_path: default_database_path(),
            static_dir: default_static_dir(),
        }
    }
}

/// Key material for credential hashing.
///
/// Kept apart from the Twitter signing secrets so no key serves two
/// cryptographic purposes.
#[derive(Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub hash_key: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("hash_key", &"<redacted>")
            .finish()
    }
}

/// OAuth 2.0 authorization-code provider (Google, Facebook)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OAuth2ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub profile_url: String,
}

impl OAuth2ProviderConfig {
    pub fn google_defaults() -> Self {
        Self {
            scopes: vec!["https://www.googleapis.com/auth/userinfo.profile".to_string()],
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            profile_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            ..Self::default()
        }
    }

    pub fn facebook_defaults() -> Self {
        Self {
            scopes: vec!["public_profile".to_string()],
            auth_url: "https://www.facebook.com/v10.0/dialog/oauth".to_string(),
            token_url: "https://graph.facebook.com/v10.0/oauth/access_token".to_string(),
            profile_url: "https://graph.facebook.com/v10.0/me".to_string(),
            ..Self::default()
        }
    }

    /// Usable only when both client credentials are configured
    pub fn is_enabled(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Fill blank endpoints and scopes from `defaults`
    fn fill_blanks(&mut self, defaults: Self) {
        if self.scopes.is_empty() {
            self.scopes = defaults.scopes;
        }
        if self.auth_url.is_empty() {
            self.auth_url = defaults.auth_url;
        }
        if self.token_url.is_empty() {
            self.token_url = defaults.token_url;
        }
        if self.profile_url.is_empty() {
            self.profile_url = defaults.profile_url;
        }
    }
}

/// Twitter OAuth 1.0a three-legged flow
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Application access token, used to sign the request-token call
    pub token_key: String,
    pub token_secret: String,
    pub redirect_url: String,
    pub request_token_url: String,
    pub authorize_url: String,
    pub access_token_url: String,
    pub verify_credentials_url: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            token_key: String::new(),
            token_secret: String::new(),
            redirect_url: String::new(),
            request_token_url: "https://api.twitter.com/oauth/request_token".to_string(),
            authorize_url: "https://api.twitter.com/oauth/authenticate".to_string(),
            access_token_url: "https://api.twitter.com/oauth/access_token".to_string(),
            verify_credentials_url: "https://api.twitter.com/1.1/account/verify_credentials.json"
                .to_string(),
        }
    }
}

impl TwitterConfig {
    /// Usable only when the consumer and application token pairs are configured
    pub fn is_enabled(&self) -> bool {
        [
            &self.consumer_key,
            &self.consumer_secret,
            &self.token_key,
            &self.token_secret,
        ]
        .iter()
        .all(|v| !v.is_empty())
    }

    fn fill_blanks(&mut self) {
        let defaults = Self::default();
        if self.request_token_url.is_empty() {
            self.request_token_url = defaults.request_token_url;
        }
        if self.authorize_url.is_empty() {
            self.authorize_url = defaults.authorize_url;
        }
        if self.access_token_url.is_empty() {
            self.access_token_url = defaults.access_token_url;
        }
        if self.verify_credentials_url.is_empty() {
            self.verify_credentials_url = defaults.verify_credentials_url;
        }
    }
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            google: OAuth2ProviderConfig::google_defaults(),
            facebook: OAuth2ProviderConfig::facebook_defaults(),
            twitter: TwitterConfig::default(),
        }
    }
}

impl ForumConfig {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// Overlay `FORUM_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`, keyed by environment variable name
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, name: &str| {
            if let Some(v) = lookup(name) {
                *target = v;
            }
        };

        set(&mut self.server.listen_addr, "FORUM_LISTEN_ADDR");
        set(&mut self.server.database_path, "FORUM_DATABASE_PATH");
        set(&mut self.server.static_dir, "FORUM_STATIC_DIR");
        set(&mut self.security.hash_key, "FORUM_HASH_KEY");

        for (prefix, provider) in [
            ("FORUM_GOOGLE", &mut self.google),
            ("FORUM_FACEBOOK", &mut self.facebook),
        ] {
            set(&mut provider.client_id, &format!("{}_CLIENT_ID", prefix));
            set(&mut provider.client_secret, &format!("{}_CLIENT_SECRET", prefix));
            set(&mut provider.redirect_url, &format!("{}_REDIRECT_URL", prefix));
            set(&mut provider.auth_url, &format!("{}_AUTH_URL", prefix));
            set(&mut provider.token_url, &format!("{}_TOKEN_URL", prefix));
            set(&mut provider.profile_url, &format!("{}_PROFILE_URL", prefix));
            if let Some(scopes) = lookup(&format!("{}_SCOPES", prefix)) {
                provider.scopes = split_list(&scopes);
            }
        }

        let twitter = &mut self.twitter;
        set(&mut twitter.consumer_key, "FORUM_TWITTER_CONSUMER_KEY");
        set(&mut twitter.consumer_secret, "FORUM_TWITTER_CONSUMER_SECRET");
        set(&mut twitter.token_key, "FORUM_TWITTER_TOKEN_KEY");
        set(&mut twitter.token_secret, "FORUM_TWITTER_TOKEN_SECRET");
        set(&mut twitter.redirect_url, "FORUM_TWITTER_REDIRECT_URL");
        set(&mut twitter.request_token_url, "FORUM_TWITTER_REQUEST_TOKEN_URL");
        set(&mut twitter.authorize_url, "FORUM_TWITTER_AUTHORIZE_URL");
        set(&mut twitter.access_token_url, "FORUM_TWITTER_ACCESS_TOKEN_URL");
        set(
            &mut twitter.verify_credentials_url,
            "FORUM_TWITTER_VERIFY_CREDENTIALS_URL",
        );

        self.fill_blanks();
    }

    fn fill_blanks(&mut self) {
        self.google
            .fill_blanks(OAuth2ProviderConfig::google_defaults());
        self.facebook
            .fill_blanks(OAuth2ProviderConfig::facebook_defaults());
        self.twitter.fill_blanks();
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ForumConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("Invalid config file {}", path))
}

/// Parse configuration from a TOML string
pub fn parse_config(contents: &str) -> Result<ForumConfig> {
    let mut config: ForumConfig = toml::from_str(contents)?;
    config.fill_blanks();
    Ok(config)
}
