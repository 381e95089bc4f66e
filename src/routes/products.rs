use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Products Router Module
///
/// CRUD plus listing for the products resource. Listing is admin-only while
/// creation is open to both roles; updates and deletion are admin-only.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        // GET /products?minPrice=&maxPrice=&status=&fields=...   POST /products
        .route(
            "/products",
            get(handlers::get_products).post(handlers::create_product),
        )
        // PATCH /products/{id}   DELETE /products/{id}
        .route(
            "/products/{id}",
            patch(handlers::update_product).delete(handlers::delete_product),
        )
}
