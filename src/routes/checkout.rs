use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::{
        checkout::{CheckoutRequest, CheckoutResponse, PaymentReturnQuery},
        orders::OrderWithItems,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/checkout/success", get(payment_success))
        .route("/checkout/cancel", get(payment_cancel))
}

#[utoipa::path(
    post,
    path = "/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Approval URL to redirect the buyer to", body = ApiResponse<CheckoutResponse>),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Payment gateway failed; the order is unchanged")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let resp = checkout_service::initiate_payment(&state, &user, payload.order_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/checkout/success",
    params(PaymentReturnQuery),
    responses(
        (status = 200, description = "Payment captured, order paid", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "No order for this payment"),
        (status = 502, description = "Capture failed; the order stays pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn payment_success(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PaymentReturnQuery>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = checkout_service::complete_payment(&state, &user, &query.token).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/checkout/cancel",
    params(PaymentReturnQuery),
    responses(
        (status = 200, description = "Payment abandoned, order back to unpaid", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "No order for this payment")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn payment_cancel(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PaymentReturnQuery>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = checkout_service::cancel_payment(&state, &user, &query.token).await?;
    Ok(Json(resp))
}
