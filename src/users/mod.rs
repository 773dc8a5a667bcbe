use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

mod store;

pub use store::SqliteUserStore;

/// Identity provider a user account originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
    Twitter,
    /// Sentinel for fixtures and seeded accounts; has no OAuth flow
    Test,
}

impl Provider {
    /// Providers that can be used to sign in
    pub const OAUTH: [Provider; 3] = [Provider::Google, Provider::Facebook, Provider::Twitter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
            Provider::Twitter => "twitter",
            Provider::Test => "test",
        }
    }

    /// Whether an API key is minted together with a new account
    pub fn mints_api_key_on_signup(&self) -> bool {
        matches!(self, Provider::Google | Provider::Facebook)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            "twitter" => Ok(Provider::Twitter),
            "test" => Ok(Provider::Test),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Provider name not in the fixed set
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownProvider(pub String);

impl std::fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown provider '{}'", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

/// Local user account
///
/// Credential hashes are skipped on serialization so a `User` can be
/// returned from handlers as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// Storage-assigned id
    pub id: i64,
    /// Provider-scoped external id
    pub login: String,
    #[serde(skip)]
    pub provider: Provider,
    pub name: String,
    #[serde(skip)]
    pub access_token_hash: String,
    #[serde(skip)]
    pub api_key_hash: Option<String>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

/// Account to be inserted; id and creation time are assigned by storage
#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub provider: Provider,
    pub name: String,
    pub access_token_hash: String,
    pub api_key_hash: Option<String>,
}

/// Lookup keys for `UserRepository::find`
#[derive(Debug, Clone, Copy)]
pub enum UserFilter<'a> {
    Login { login: &'a str, provider: Provider },
    AccessTokenHash(&'a str),
    ApiKeyHash(&'a str),
}

/// Storage interface for user accounts.
///
/// `(provider, login)` is unique. Update operations fail when no row
/// matches the id.
pub trait UserRepository: Send + Sync {
    fn find(&self, filter: UserFilter<'_>) -> Result<Option<User>>;

    fn create(&self, user: NewUser) -> Result<User>;

    fn update_access_token_hash(&self, user_id: i64, hash: &str) -> Result<()>;

    fn update_api_key_hash(&self, user_id: i64, hash: &str) -> Result<()>;
}
