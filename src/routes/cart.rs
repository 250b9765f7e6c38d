use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartList, QuantityRequest, RemoveResult},
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartItem,
    response::ApiResponse,
    routes::params::Pagination,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart_list).post(add_to_cart))
        .route("/add_to_cart/{product_id}", post(add_product_to_cart))
        .route("/remove_from_cart/{cart_id}", post(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/cart",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Cart lines and total for the current user", body = ApiResponse<CartList>),
        (status = 401, description = "Not logged in")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add to the cart, incrementing an existing line", body = ApiResponse<CartItem>),
        (status = 404, description = "Product not found"),
        (status = 422, description = "Invalid quantity"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp =
        cart_service::add_item(&state, &user, payload.product_id, payload.quantity).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/add_to_cart/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body(content = QuantityRequest, description = "Optional, defaults to a quantity of 1"),
    responses(
        (status = 200, description = "Add to the cart, incrementing an existing line", body = ApiResponse<CartItem>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_product_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    payload: Option<Json<QuantityRequest>>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let Json(payload) = payload.unwrap_or_default();
    let resp = cart_service::add_item(&state, &user, product_id, payload.quantity).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/remove_from_cart/{cart_id}",
    params(
        ("cart_id" = Uuid, Path, description = "Cart line ID")
    ),
    request_body(content = QuantityRequest, description = "Optional, defaults to a quantity of 1"),
    responses(
        (status = 200, description = "Line decremented or removed", body = ApiResponse<RemoveResult>),
        (status = 404, description = "Cart line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(cart_id): Path<Uuid>,
    payload: Option<Json<QuantityRequest>>,
) -> AppResult<Json<ApiResponse<RemoveResult>>> {
    let Json(payload) = payload.unwrap_or_default();
    let resp = cart_service::remove_item(&state, &user, cart_id, payload.quantity).await?;
    Ok(Json(resp))
}
