use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    routing::get,
};

use crate::{response::ApiResponse, state::AppState};

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod doc;
pub mod health;
pub mod home;
pub mod orders;
pub mod params;
pub mod products;

// Storefront routes live at the root; state is provided at the top level.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health_check))
        .merge(auth::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(checkout::router())
        .nest("/products", products::router())
}

/// Storefront routes plus API docs and the JSON 404, bound to `state`.
pub fn app(state: AppState) -> Router {
    create_router()
        .merge(doc::scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    tracing::debug!(path = %uri.path(), "no route");
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::flash("Not Found")),
    )
}
