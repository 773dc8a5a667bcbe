//! Comment endpoints. Same access rules as posts.

use super::posts::acting_user;
use super::response::{respond, ApiError, ApiJson, ApiPath, ApiQuery, Format};
use super::AppState;
use crate::content::{Comment, CommentList, CommentUpdate, NewComment};
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
pub struct CommentFilter {
    #[serde(rename = "postId")]
    post_id: Option<i64>,
}

fn owned_comment(state: &AppState, id: i64, user: &User) -> Result<Comment, ApiError> {
    let comment = state
        .content
        .get_comment(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Comment {} not found", id)))?;
    if comment.user_id != user.id {
        return Err(ApiError::Forbidden(format!(
            "Comment {} belongs to another user",
            id
        )));
    }
    Ok(comment)
}

/// GET /comments
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<CommentFilter>,
    ApiQuery(format): ApiQuery<Format>,
) -> Result<Response, ApiError> {
    let comments = state.content.list_comments(filter.post_id)?;
    respond(StatusCode::OK, &format, &CommentList { comments })
}

/// GET /comments/:id
pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(format): ApiQuery<Format>,
) -> Result<Response, ApiError> {
    let comment = state
        .content
        .get_comment(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Comment {} not found", id)))?;
    respond(StatusCode::OK, &format, &comment)
}

/// POST /comments
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiQuery(format): ApiQuery<Format>,
    ApiJson(new_comment): ApiJson<NewComment>,
) -> Result<Response, ApiError> {
    let user = acting_user(&identity)?;
    new_comment.validate()?;
    if state.content.get_post(new_comment.post_id)?.is_none() {
        return Err(ApiError::BadRequest(format!(
            "Post {} does not exist",
            new_comment.post_id
        )));
    }

    let comment = state.content.create_comment(user.id, &new_comment)?;
    info!(comment_id = comment.id, post_id = comment.post_id, user_id = user.id, "Comment created");
    respond(StatusCode::CREATED, &format, &comment)
}

/// PUT /comments
pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiQuery(format): ApiQuery<Format>,
    ApiJson(update): ApiJson<CommentUpdate>,
) -> Result<Response, ApiError> {
    let user = acting_user(&identity)?;
    update.validate()?;
    owned_comment(&state, update.id, user)?;

    let comment = state
        .content
        .update_comment(&update)?
        .ok_or_else(|| ApiError::NotFound(format!("Comment {} not found", update.id)))?;
    info!(comment_id = comment.id, user_id = user.id, "Comment updated");
    respond(StatusCode::OK, &format, &comment)
}

/// DELETE /comments/:id
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let user = acting_user(&identity)?;
    owned_comment(&state, id, user)?;

    if !state.content.delete_comment(id)? {
        return Err(ApiError::NotFound(format!("Comment {} not found", id)));
    }
    info!(comment_id = id, user_id = user.id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
