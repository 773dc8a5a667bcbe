//! Home, logout and API key issuance.

use super::response::ApiError;
use super::AppState;
use crate::session::session_removal;
use crate::users::{Provider, User};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

#[derive(Serialize)]
pub struct HomeResponse {
    user: Option<User>,
    providers: Vec<Provider>,
}

#[derive(Serialize)]
pub struct ApiKeyResponse {
    #[serde(rename = "APIKey")]
    api_key: String,
}

/// GET /
pub async fn home(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<HomeResponse> {
    Json(HomeResponse {
        user: state.identity.resolve(&headers).into_user(),
        providers: state.providers.enabled(),
    })
}

/// GET /logout
///
/// Rotates the stored session hash so the cookie stops working even if the
/// browser keeps it.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let Some(user) = state.identity.resolve(&headers).into_user() else {
        return Redirect::to("/").into_response();
    };

    if let Err(e) = state.reconciler.revoke(&user) {
        error!(user_id = user.id, error = %format!("{:#}", e), "Logout failed to revoke session");
    }
    (jar.remove(session_removal()), Redirect::to("/")).into_response()
}

/// GET /getapikey
///
/// The raw key is only ever returned here, once.
pub async fn get_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let user = state
        .identity
        .resolve(&headers)
        .into_user()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))?;

    let api_key = state.reconciler.issue_api_key(&user)?;
    Ok(Json(ApiKeyResponse { api_key }))
}
