use crate::{AppState, handlers::auth};
use axum::{Router, routing::post};

/// Public Router Module
///
/// Endpoints reachable without a session. `/health` is mounted separately in
/// `create_router` so it also bypasses the API key check.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/register
        // Creates an admin account and returns a signed-in session.
        .route("/auth/register", post(auth::register))
        // POST /auth/login
        // Admin-issuer session for any account.
        .route("/auth/login", post(auth::login))
        // POST /root/login
        // Root-issuer session, super-admins only.
        .route("/root/login", post(auth::root_login))
}
