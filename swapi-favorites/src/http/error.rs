use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing email or password")]
    MissingCredentials,
    #[error("{0}")]
    InvalidBody(String),
    #[error("Email already exists")]
    EmailTaken,
    #[error("{0} already in favorites")]
    AlreadyFavorite(&'static str),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Missing Authorization Header")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("database unavailable")]
    Unavailable,
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredentials
            | ApiError::InvalidBody(_)
            | ApiError::EmailTaken
            | ApiError::AlreadyFavorite(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::MissingToken
            | ApiError::InvalidToken
            | ApiError::ExpiredToken => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Token problems and duplicate favorites answer under `msg`; everything
    /// else under `error`.
    fn body_key(&self) -> &'static str {
        match self {
            ApiError::AlreadyFavorite(_)
            | ApiError::MissingToken
            | ApiError::InvalidToken
            | ApiError::ExpiredToken => "msg",
            _ => "error",
        }
    }

    fn is_token_failure(&self) -> bool {
        matches!(
            self,
            ApiError::MissingToken | ApiError::InvalidToken | ApiError::ExpiredToken
        )
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownUser(user_id) => {
                warn!(user_id, "token names a user that does not exist");
                ApiError::InvalidToken
            }
            other => {
                error!(error = %other, "store operation failed");
                ApiError::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Expired => ApiError::ExpiredToken,
            AuthError::Invalid => ApiError::InvalidToken,
            AuthError::Hashing | AuthError::MalformedHash | AuthError::Signing(_) => {
                error!(error = %err, "credential operation failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::Map::new();
        body.insert(
            String::from(self.body_key()),
            serde_json::Value::String(self.to_string()),
        );
        let mut response = (self.status(), Json(body)).into_response();
        if self.is_token_failure() {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
