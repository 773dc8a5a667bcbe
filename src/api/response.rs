//! Error bodies and JSON/XML representation.

use crate::content::ValidationError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP-facing errors, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(String),
    /// Unusable path, query or body; keeps the extractor's status
    Rejected(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Rejected(status, msg) => (status, msg),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = %format!("{:#}", e), "Request failed");
        ApiError::Internal("internal error".to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

/// `axum::Json` with rejections rendered as `ApiError`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` with rejections rendered as `ApiError`
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Query` with rejections rendered as `ApiError`
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `?xml` anywhere in the query string selects XML
#[derive(Debug, Default, Deserialize)]
pub struct Format {
    #[serde(default)]
    xml: Option<String>,
}

impl Format {
    pub fn xml() -> Self {
        Self {
            xml: Some(String::new()),
        }
    }

    pub fn wants_xml(&self) -> bool {
        self.xml.is_some()
    }
}

/// Serialize `body` as JSON, or as XML when requested
pub fn respond<T: Serialize>(
    status: StatusCode,
    format: &Format,
    body: &T,
) -> Result<Response, ApiError> {
    if !format.wants_xml() {
        return Ok((status, Json(body)).into_response());
    }

    let xml = quick_xml::se::to_string(body).map_err(|e| {
        error!(error = %e, "XML serialization failed");
        ApiError::Internal("internal error".to_string())
    })?;
    Ok((status, [(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}
