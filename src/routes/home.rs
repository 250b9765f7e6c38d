use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::response::{ApiResponse, Meta};

#[derive(Serialize, ToSchema)]
pub struct HomeData {
    pub shop: String,
    pub links: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Storefront landing", body = ApiResponse<HomeData>),
    ),
    tag = "Home"
)]
pub async fn home() -> Json<ApiResponse<HomeData>> {
    let data = HomeData {
        shop: "COZZY FITS".to_string(),
        links: ["/products", "/cart", "/review_order", "/orders", "/login", "/register"]
            .into_iter()
            .map(String::from)
            .collect(),
    };

    Json(ApiResponse::success(
        "Welcome to COZZY FITS",
        data,
        Some(Meta::empty()),
    ))
}
