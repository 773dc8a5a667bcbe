//! Request identity resolution.
//!
//! Turns the raw credential a client presents (session cookie or `APIKey`
//! header) into a local user. Resolution never fails: anything short of a
//! matching user row yields `Identity::Anonymous`.

use crate::auth::{extract_credential, Credential, CredentialHasher};
use crate::users::{User, UserFilter, UserRepository};
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Acting identity of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }
}

/// Resolves request credentials against the user repository
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>, hasher: CredentialHasher) -> Self {
        Self { users, hasher }
    }

    /// Resolve the acting user of a request
    pub fn resolve(&self, headers: &HeaderMap) -> Identity {
        match extract_credential(headers) {
            Ok(credential) => self.resolve_credential(&credential),
            Err(e) => {
                debug!(reason = %e, "No usable credential, treating request as anonymous");
                Identity::Anonymous
            }
        }
    }

    /// Resolve an already extracted credential
    pub fn resolve_credential(&self, credential: &Credential) -> Identity {
        let hash = self.hasher.hash(credential.raw());
        let filter = match credential {
            Credential::SessionToken(_) => UserFilter::AccessTokenHash(&hash),
            Credential::ApiKey(_) => UserFilter::ApiKeyHash(&hash),
        };

        match self.users.find(filter) {
            Ok(Some(user)) => Identity::User(user),
            Ok(None) => {
                debug!("Credential does not match any user");
                Identity::Anonymous
            }
            Err(e) => {
                error!(error = %e, "User lookup failed during identity resolution");
                Identity::Anonymous
            }
        }
    }
}
