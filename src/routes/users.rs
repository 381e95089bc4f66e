use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Users Router Module
///
/// CRUD plus listing for the users resource. Listing, creation and deletion
/// are admin-only; updates are open to both roles. The requirements live in
/// the policy registry and are enforced by the gate call inside each handler.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // GET /users?page=&limit=&sortField=...   POST /users
        .route("/users", get(handlers::get_users).post(handlers::create_user))
        // PATCH /users/{id}   DELETE /users/{id}
        .route(
            "/users/{id}",
            patch(handlers::update_user).delete(handlers::delete_user),
        )
}
