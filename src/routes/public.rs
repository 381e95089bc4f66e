use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. None of these carry an entry in the
/// policy registry, so the gate resolves them to the documented open default
/// and the pipeline proceeds anonymously, token or not.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness endpoint for monitoring and load balancers.
        .route("/health", get(handlers::health))
        // POST /login
        // Credential check against the stored bcrypt hash; issues a token.
        .route("/login", post(handlers::login))
        // POST /register
        // Self-service account creation with the plain user role.
        .route("/register", post(handlers::register))
}
