//! Post endpoints.
//!
//! Reads are open to everyone. Writes reach these handlers only through the
//! authorization gate, which leaves the acting `Identity` in the request
//! extensions; ownership is checked here.

use super::response::{respond, ApiError, ApiJson, ApiPath, ApiQuery, Format};
use super::AppState;
use crate::content::{CommentList, NewPost, Post, PostList, PostUpdate};
use crate::identity::Identity;
use crate::users::User;
use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Extension,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct PostFilter {
    #[serde(rename = "userId")]
    user_id: Option<i64>,
}

/// User behind a gated request
pub(super) fn acting_user(identity: &Identity) -> Result<&User, ApiError> {
    identity
        .user()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}

fn owned_post(state: &AppState, id: i64, user: &User) -> Result<Post, ApiError> {
    let post = state
        .content
        .get_post(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Post {} not found", id)))?;
    if post.user_id != user.id {
        return Err(ApiError::Forbidden(format!(
            "Post {} belongs to another user",
            id
        )));
    }
    Ok(post)
}

/// GET /posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<PostFilter>,
    ApiQuery(format): ApiQuery<Format>,
) -> Result<Response, ApiError> {
    let posts = state.content.list_posts(filter.user_id)?;
    respond(StatusCode::OK, &format, &PostList { posts })
}

/// GET /posts/:id
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(format): ApiQuery<Format>,
) -> Result<Response, ApiError> {
    let post = state
        .content
        .get_post(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Post {} not found", id)))?;
    respond(StatusCode::OK, &format, &post)
}

/// GET /posts/:id/comments
pub async fn list_post_comments(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(format): ApiQuery<Format>,
) -> Result<Response, ApiError> {
    if state.content.get_post(id)?.is_none() {
        return Err(ApiError::NotFound(format!("Post {} not found", id)));
    }
    let comments = state.content.list_comments(Some(id))?;
    respond(StatusCode::OK, &format, &CommentList { comments })
}

/// POST /posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiQuery(format): ApiQuery<Format>,
    ApiJson(new_post): ApiJson<NewPost>,
) -> Result<Response, ApiError> {
    let user = acting_user(&identity)?;
    new_post.validate()?;

    let post = state.content.create_post(user.id, &new_post)?;
    info!(post_id = post.id, user_id = user.id, "Post created");
    respond(StatusCode::CREATED, &format, &post)
}

/// PUT /posts
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiQuery(format): ApiQuery<Format>,
    ApiJson(update): ApiJson<PostUpdate>,
) -> Result<Response, ApiError> {
    let user = acting_user(&identity)?;
    update.validate()?;
    owned_post(&state, update.id, user)?;

    let post = state
        .content
        .update_post(&update)?
        .ok_or_else(|| ApiError::NotFound(format!("Post {} not found", update.id)))?;
    info!(post_id = post.id, user_id = user.id, "Post updated");
    respond(StatusCode::OK, &format, &post)
}

/// DELETE /posts/:id
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let user = acting_user(&identity)?;
    owned_post(&state, id, user)?;

    if !state.content.delete_post(id)? {
        return Err(ApiError::NotFound(format!("Post {} not found", id)));
    }
    info!(post_id = id, user_id = user.id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}
