// HTTP surface: sign-in, account and content routes

pub mod account;
pub mod auth_middleware;
pub mod comments;
pub mod oauth;
pub mod posts;
pub mod response;

pub use auth_middleware::{authorize_request, AuthError};
pub use response::ApiError;

use crate::auth::CredentialHasher;
use crate::content::ContentStore;
use crate::identity::IdentityResolver;
use crate::oauth::ProviderRegistry;
use crate::session::AccountReconciler;
use crate::users::UserRepository;
use axum::{middleware, routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub content: Arc<ContentStore>,
    pub identity: IdentityResolver,
    pub reconciler: AccountReconciler,
    pub providers: ProviderRegistry,
    /// Outbound client for provider calls
    pub http: reqwest::Client,
}

impl AppState {
    /// Wire resolver and reconciler to the same repository and hashing key
    pub fn new(
        users: Arc<dyn UserRepository>,
        content: Arc<ContentStore>,
        hasher: CredentialHasher,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            identity: IdentityResolver::new(users.clone(), hasher.clone()),
            reconciler: AccountReconciler::new(users.clone(), hasher),
            users,
            content,
            providers,
            http: reqwest::Client::new(),
        }
    }
}

/// Build the complete router
///
/// Content routes and `/getapikey` sit behind the authorization gate;
/// sign-in, home and logout do not.
pub fn create_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let state = Arc::new(state);

    let gated = Router::new()
        .route(
            "/posts",
            get(posts::list_posts)
                .post(posts::create_post)
                .put(posts::update_post),
        )
        .route(
            "/posts/:id",
            get(posts::get_post).delete(posts::delete_post),
        )
        .route("/posts/:id/comments", get(posts::list_post_comments))
        .route(
            "/comments",
            get(comments::list_comments)
                .post(comments::create_comment)
                .put(comments::update_comment),
        )
        .route(
            "/comments/:id",
            get(comments::get_comment).delete(comments::delete_comment),
        )
        .route("/getapikey", get(account::get_api_key))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::require_identity,
        ));

    Router::new()
        .route("/", get(account::home))
        .route("/logout", get(account::logout))
        .route("/auth/:provider", get(oauth::begin_auth))
        .route("/auth/callback/:provider", get(oauth::auth_callback))
        .merge(gated)
        .nest_service("/public", ServeDir::new(static_dir))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
}
