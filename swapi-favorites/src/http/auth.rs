use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::{debug, warn};

use super::error::ApiError;
use super::state::AppState;

/// Identity of the caller, taken from a verified bearer token.
///
/// Adding this as a handler argument makes the route require authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers)
    }
}

pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    let Some(raw) = headers.get(AUTHORIZATION) else {
        warn!("request without authorization header");
        return Err(ApiError::MissingToken);
    };

    let Some(token) = raw.to_str().ok().and_then(extract_bearer_token) else {
        warn!("authorization header is not a bearer token");
        return Err(ApiError::InvalidToken);
    };

    match state.tokens.verify(token) {
        Ok(id) => {
            debug!(user_id = id, "authorized request using bearer token");
            Ok(CurrentUser { id })
        }
        Err(err) => {
            warn!(error = %err, "rejected bearer token");
            Err(err.into())
        }
    }
}

pub fn extract_bearer_token(raw: &str) -> Option<&str> {
    let mut parts = raw.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || parts.next().is_some() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::extract_bearer_token;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("  BEARER   abc "), Some("abc"));
    }

    #[test]
    fn other_schemes_and_shapes_are_rejected() {
        assert_eq!(extract_bearer_token("Basic YWRtaW46c2VjcmV0"), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
        assert_eq!(extract_bearer_token("Bearer a b"), None);
        assert_eq!(extract_bearer_token("abc"), None);
    }
}
