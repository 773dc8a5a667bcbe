//! Local accounts and session credentials.
//!
//! The reconciler is the only writer of credential hashes: it creates or
//! refreshes accounts after a sign-in, rotates the session hash on logout and
//! mints API keys. Raw tokens leave this module exactly once, in the return
//! value, and are never stored.

use crate::auth::{token::access_token, CredentialHasher, SESSION_COOKIE};
use crate::oauth::ExternalIdentity;
use crate::users::{NewUser, User, UserFilter, UserRepository};
use anyhow::{Context, Result};
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;
use time::Duration;
use tracing::info;

const SESSION_COOKIE_MAX_AGE: Duration = Duration::days(30);

/// Session cookie holding the raw access token for 30 days
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .max_age(SESSION_COOKIE_MAX_AGE)
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie used to expire the session cookie
pub fn session_removal() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// A signed-in user plus the raw session token to hand to the browser
#[derive(Debug)]
pub struct IssuedSession {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct AccountReconciler {
    users: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
}

impl AccountReconciler {
    pub fn new(users: Arc<dyn UserRepository>, hasher: CredentialHasher) -> Self {
        Self { users, hasher }
    }

    /// Create or refresh the local account for an external identity.
    ///
    /// A returning user gets a new access-token hash, which invalidates the
    /// session issued at their previous sign-in.
    pub fn reconcile(&self, identity: &ExternalIdentity) -> Result<IssuedSession> {
        let existing = self
            .users
            .find(UserFilter::Login {
                login: &identity.external_id,
                provider: identity.provider,
            })
            .context("Failed to look up user for sign-in")?;

        let token = access_token();
        let token_hash = self.hasher.hash(&token);

        let user = match existing {
            Some(mut user) => {
                self.users
                    .update_access_token_hash(user.id, &token_hash)
                    .context("Failed to rotate access token")?;
                user.access_token_hash = token_hash;
                info!(user_id = user.id, provider = %user.provider, "Returning user signed in");
                user
            }
            None => {
                let api_key_hash = identity
                    .provider
                    .mints_api_key_on_signup()
                    .then(|| self.hasher.hash(&access_token()));
                let user = self
                    .users
                    .create(NewUser {
                        login: identity.external_id.clone(),
                        provider: identity.provider,
                        name: identity.display_name.clone(),
                        access_token_hash: token_hash,
                        api_key_hash,
                    })
                    .context("Failed to create user")?;
                info!(user_id = user.id, provider = %user.provider, "New user signed up");
                user
            }
        };

        Ok(IssuedSession { user, token })
    }

    /// Invalidate the user's session by storing the hash of a token nobody holds
    pub fn revoke(&self, user: &User) -> Result<()> {
        let unusable = self.hasher.hash(&access_token());
        self.users
            .update_access_token_hash(user.id, &unusable)
            .context("Failed to revoke session")?;
        info!(user_id = user.id, "Session revoked");
        Ok(())
    }

    /// Mint a new API key, replacing any previous one. Returns the raw key.
    pub fn issue_api_key(&self, user: &User) -> Result<String> {
        let key = access_token();
        self.users
            .update_api_key_hash(user.id, &self.hasher.hash(&key))
            .context("Failed to store API key")?;
        info!(user_id = user.id, "API key issued");
        Ok(key)
    }
}
