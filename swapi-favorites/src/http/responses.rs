use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub endpoints: &'static [EndpointInfo],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub auth: bool,
}

pub const ENDPOINTS: &[EndpointInfo] = &[
    endpoint("GET", "/", false),
    endpoint("GET", "/health", false),
    endpoint("GET", "/user", false),
    endpoint("POST", "/signup", false),
    endpoint("POST", "/login", false),
    endpoint("GET", "/api/people", false),
    endpoint("GET", "/api/people/{id}", false),
    endpoint("GET", "/api/planets", false),
    endpoint("GET", "/api/planets/{id}", false),
    endpoint("GET", "/api/users", false),
    endpoint("GET", "/api/users/favorites", true),
    endpoint("POST", "/api/favorite/planet/{id}", true),
    endpoint("POST", "/api/favorite/people/{id}", true),
    endpoint("DELETE", "/api/favorite/planet/{id}", true),
    endpoint("DELETE", "/api/favorite/people/{id}", true),
];

const fn endpoint(method: &'static str, path: &'static str, auth: bool) -> EndpointInfo {
    EndpointInfo { method, path, auth }
}

/// Body of `/signup` and `/login`. Fields are optional so that a missing one
/// is reported by the handler rather than by the JSON extractor.
#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Both fields, if both are present and non-empty.
    pub fn into_required(self) -> Option<(String, String)> {
        let email = self.email.filter(|v| !v.is_empty())?;
        let password = self.password.filter(|v| !v.is_empty())?;
        Some((email, password))
    }
}
