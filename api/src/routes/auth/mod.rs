//! # auth Routes Module
//!
//! Defines and wires up routes for the `/auth` endpoint group.
//!
//! ## Structure
//! - `post.rs` — POST handlers (register, token, refresh)
//! - `get.rs` — GET handlers (current principal)
//! - `common.rs` — shared principal payload mapping

pub mod common;
pub mod get;
pub mod post;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;
use get::get_me;
use post::{refresh, register, token};

/// Builds the `/auth` route group, mapping HTTP methods to handlers.
///
/// - `POST /auth/register` → `register`
/// - `POST /auth/token` → `token` (form-encoded login)
/// - `POST /auth/refresh` → `refresh`
/// - `GET /auth/me` → `get_me`
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(token))
        .route("/refresh", post(refresh))
        .route("/me", get(get_me))
}
