//! Sign-in endpoints.
//!
//! GET /auth/:provider            -> redirect to the provider, state in `oauthstate`
//! GET /auth/callback/:provider   -> finish the flow, set the session cookie
//!
//! A failed callback always ends in a redirect home. The failure reason is
//! only logged.

use super::response::ApiError;
use super::AppState;
use crate::oauth::{
    self,
    state::{clear_state, read_state, state_cookie},
    CallbackParams,
};
use crate::session::session_cookie;
use crate::users::Provider;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{info, warn};

fn sign_in_provider(name: &str) -> Result<Provider, ApiError> {
    name.parse::<Provider>()
        .ok()
        .filter(|p| Provider::OAUTH.contains(p))
        .ok_or_else(|| ApiError::NotFound(format!("Provider '{}' not found", name)))
}

/// GET /auth/:provider
pub async fn begin_auth(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let provider = sign_in_provider(&name)?;
    let strategy = state.providers.get(provider).map_err(|e| {
        warn!(provider = %provider, "Sign-in requested for unconfigured provider");
        ApiError::ServiceUnavailable(e.to_string())
    })?;

    match oauth::begin(strategy.as_ref(), &state.http).await {
        Ok(redirect) => {
            info!(provider = %provider, "Redirecting to identity provider");
            let jar = jar.add(state_cookie(redirect.state));
            Ok((jar, Redirect::temporary(&redirect.url)).into_response())
        }
        Err(reason) => {
            warn!(provider = %provider, reason = %reason, "Sign-in could not start");
            Ok(Redirect::to("/").into_response())
        }
    }
}

/// GET /auth/callback/:provider
pub async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let provider = sign_in_provider(&name)?;

    // The state value is single-use whatever the outcome
    let stored_state = read_state(&jar);
    let jar = clear_state(jar);

    let outcome = match state.providers.get(provider) {
        Ok(strategy) => {
            oauth::complete(
                strategy.as_ref(),
                &state.http,
                &params,
                stored_state.as_deref(),
            )
            .await
        }
        Err(e) => Err(e),
    };

    let identity = match outcome {
        Ok(identity) => identity,
        Err(reason) => {
            warn!(provider = %provider, reason = %reason, "Sign-in aborted");
            return Ok((jar, Redirect::to("/")).into_response());
        }
    };

    match state.reconciler.reconcile(&identity) {
        Ok(session) => {
            info!(user_id = session.user.id, provider = %provider, "Signed in");
            let jar = jar.add(session_cookie(session.token));
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e) => {
            warn!(provider = %provider, error = %format!("{:#}", e), "Account reconciliation failed");
            Ok((jar, Redirect::to("/")).into_response())
        }
    }
}
