//! HTTP layer: Axum router, handlers, and responses.
//!
//! Public routes (`/`, `/signup`, `/login`, `/api/people`, ...) and the
//! bearer-protected favorites routes under `/api`.

mod auth;
mod error;
mod handlers;
mod responses;
mod state;


pub use handlers::router;
pub use state::AppState;
