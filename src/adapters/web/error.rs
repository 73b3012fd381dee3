//! HTTP error responses for web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::PricelabError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &PricelabError) -> StatusCode {
    match err {
        PricelabError::UnknownStrategy { .. } | PricelabError::InvalidParameter { .. } => {
            StatusCode::BAD_REQUEST
        }
        PricelabError::NoData { .. } => StatusCode::NOT_FOUND,
        PricelabError::NoTrades { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PricelabError::DataSource { .. } => StatusCode::BAD_GATEWAY,
        PricelabError::Database { .. }
        | PricelabError::DatabaseQuery { .. }
        | PricelabError::ConfigParse { .. }
        | PricelabError::ConfigMissing { .. }
        | PricelabError::ConfigInvalid { .. }
        | PricelabError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PricelabError> for WebError {
    fn from(err: PricelabError) -> Self {
        Self::new(status_from_error(&err), err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}
