use super::response::ApiError;
use super::AppState;
use crate::identity::{Identity, IdentityResolver};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;


/// Authorization errors
#[derive(Debug, PartialEq)]
pub enum AuthError {
    /// Mutating request without a resolvable identity
    AuthenticationRequired,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::AuthenticationRequired => write!(f, "authentication required"),
        }
    }
}

// 401 rather than 511: the request lacks credentials, there is no captive portal
impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Unauthorized(e.to_string())
    }
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Decide whether a request may reach a content handler
///
/// Safe methods pass without resolving anything (`Ok(None)`). Every other
/// method must resolve to a user; the resolved identity is returned so the
/// handler can check ownership.
pub fn authorize_request(
    method: &Method,
    headers: &HeaderMap,
    resolver: &IdentityResolver,
) -> Result<Option<Identity>, AuthError> {
    if is_safe_method(method) {
        return Ok(None);
    }

    match resolver.resolve(headers) {
        Identity::Anonymous => Err(AuthError::AuthenticationRequired),
        identity => Ok(Some(identity)),
    }
}

/// Middleware form of [`authorize_request`].
///
/// Stores the resolved `Identity` in the request extensions for mutating
/// requests.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authorize_request(request.method(), request.headers(), &state.identity) {
        Ok(Some(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => {
            debug!(method = %request.method(), path = %request.uri().path(), "Rejected anonymous write");
            ApiError::from(e).into_response()
        }
    }
}
