use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    config::PaymentConfig,
    dto::{checkout::CheckoutResponse, orders::OrderWithItems},
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, PaymentStatus},
    payment::{PaymentApproval, PaymentGateway, PaymentLine, PaymentRequest},
    response::{ApiResponse, Meta},
    services::order_service::{find_user_order, load_items, order_from_entity},
    state::AppState,
};

pub fn build_payment_request(
    order: &Order,
    items: &[OrderItem],
    config: &PaymentConfig,
) -> PaymentRequest {
    PaymentRequest {
        invoice_number: order.invoice_number.clone(),
        currency: order.currency.clone(),
        total: order.total_amount,
        lines: items
            .iter()
            .map(|item| PaymentLine {
                name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
        return_url: config.return_url.clone(),
        cancel_url: config.cancel_url.clone(),
    }
}

/// Ask the gateway for an approval URL. Never retried.
pub async fn request_approval(
    gateway: &dyn PaymentGateway,
    request: &PaymentRequest,
) -> AppResult<PaymentApproval> {
    gateway.create_payment(request).await.map_err(|err| {
        tracing::warn!(
            error = %err,
            invoice = %request.invoice_number,
            "payment initiation failed"
        );
        AppError::PaymentInitiation(err)
    })
}

/// Start payment for a confirmed order and return where to send the buyer.
///
/// The order is only touched after the gateway accepted the request; a gateway
/// failure leaves it exactly as it was.
pub async fn initiate_payment(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let model = find_user_order(&state.orm, user.user_id, order_id).await?;
    let items = load_items(&state.orm, model.id).await?;
    let order = order_from_entity(model)?;

    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::BadRequest("Order already paid".into()));
    }

    let request = build_payment_request(&order, &items, &state.config.payment);
    let approval = request_approval(state.payments.as_ref(), &request).await?;

    let txn = state.orm.begin().await?;
    let locked = lock_user_order(&txn, user.user_id, Condition::all().add(OrderCol::Id.eq(order.id))).await?;
    if locked.payment_status == PaymentStatus::Paid.as_str() {
        return Err(AppError::BadRequest("Order already paid".into()));
    }

    let mut active: OrderActive = locked.into();
    active.payment_status = Set(PaymentStatus::Pending.as_str().into());
    active.payment_reference = Set(Some(approval.reference.clone()));
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        reference = %approval.reference,
        "payment initiated"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "payment_initiate",
        "orders",
        serde_json::json!({ "order_id": order.id, "reference": approval.reference }),
    )
    .await;

    Ok(ApiResponse::success(
        "Redirecting to payment",
        CheckoutResponse {
            redirect_url: approval.approval_url,
        },
        Some(Meta::empty()),
    ))
}

/// Success return route: capture the payment and mark the order paid.
///
/// The order row stays locked from the status check through the capture to
/// the update, so a cancel arriving meanwhile waits and then sees `paid`.
pub async fn complete_payment(
    state: &AppState,
    user: &AuthUser,
    reference: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let locked = lock_user_order(
        &txn,
        user.user_id,
        Condition::all().add(OrderCol::PaymentReference.eq(reference)),
    )
    .await?;

    match PaymentStatus::parse(&locked.payment_status) {
        Some(PaymentStatus::Paid) => {
            txn.commit().await?;
            return order_response(state, locked, "Payment already completed").await;
        }
        Some(PaymentStatus::Pending) => {}
        _ => return Err(AppError::BadRequest("Order has no pending payment".into())),
    }

    // A failed capture drops the transaction and the order stays pending.
    state.payments.capture_payment(reference).await.map_err(|err| {
        tracing::warn!(error = %err, reference, "payment capture failed");
        AppError::PaymentInitiation(err)
    })?;

    let now = Utc::now();
    let mut active: OrderActive = locked.into();
    active.payment_status = Set(PaymentStatus::Paid.as_str().into());
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, reference, "payment captured");
    audit::record(
        &state.pool,
        user.user_id,
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order.id, "reference": reference }),
    )
    .await;

    order_response(state, order, "Payment completed, thank you for your order").await
}

/// Cancel return route: the order goes back to unpaid and can be checked out again.
pub async fn cancel_payment(
    state: &AppState,
    user: &AuthUser,
    reference: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let locked = lock_user_order(
        &txn,
        user.user_id,
        Condition::all().add(OrderCol::PaymentReference.eq(reference)),
    )
    .await?;

    match PaymentStatus::parse(&locked.payment_status) {
        Some(PaymentStatus::Paid) => {
            return Err(AppError::BadRequest("Order already paid".into()));
        }
        Some(PaymentStatus::Pending) => {}
        _ => return Err(AppError::BadRequest("Order has no pending payment".into())),
    }

    let mut active: OrderActive = locked.into();
    active.payment_status = Set(PaymentStatus::Unpaid.as_str().into());
    active.payment_reference = Set(None);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, reference, "payment cancelled");

    order_response(state, order, "Payment cancelled").await
}

async fn lock_user_order(
    txn: &sea_orm::DatabaseTransaction,
    user_id: Uuid,
    condition: Condition,
) -> AppResult<OrderModel> {
    Orders::find()
        .filter(condition.add(OrderCol::UserId.eq(user_id)))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn order_response(
    state: &AppState,
    model: OrderModel,
    message: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let items = load_items(&state.orm, model.id).await?;
    Ok(ApiResponse::success(
        message,
        OrderWithItems {
            order: order_from_entity(model)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::*;
    use crate::payment::PaymentError;

    struct ScriptedGateway {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn create_payment(
            &self,
            request: &PaymentRequest,
        ) -> Result<PaymentApproval, PaymentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PaymentError::Rejected {
                    status: 422,
                    body: "UNPROCESSABLE_ENTITY".into(),
                });
            }
            Ok(PaymentApproval {
                reference: format!("PAY-{}", request.invoice_number),
                approval_url: "https://gateway.test/approve".into(),
            })
        }

        async fn capture_payment(&self, _reference: &str) -> Result<(), PaymentError> {
            Ok(())
        }
    }

    fn order() -> (Order, Vec<OrderItem>) {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            invoice_number: "INV-20260101-deadbeef".into(),
            total_amount: Decimal::new(25, 0),
            currency: "EUR".into(),
            payment_status: PaymentStatus::Unpaid,
            payment_reference: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        let item = |name: &str, price: i64, quantity: i32| OrderItem {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: Uuid::new_v4(),
            product_name: name.into(),
            unit_price: Decimal::new(price, 0),
            quantity,
            created_at: now,
        };
        let items = vec![item("A", 10, 2), item("B", 5, 1)];
        (order, items)
    }

    fn payment_config() -> PaymentConfig {
        PaymentConfig {
            api_base: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            currency: "USD".into(),
            return_url: "https://shop.test/checkout/success".into(),
            cancel_url: "https://shop.test/checkout/cancel".into(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn payment_request_uses_order_snapshot() {
        let (order, items) = order();
        let request = build_payment_request(&order, &items, &payment_config());

        // Currency comes from the order, not from today's config.
        assert_eq!(request.currency, "EUR");
        assert_eq!(request.total, Decimal::new(25, 0));
        assert_eq!(request.lines.len(), 2);
        assert_eq!(request.lines[0].name, "A");
        assert_eq!(request.lines[0].quantity, 2);
        assert_eq!(request.return_url, "https://shop.test/checkout/success");
    }

    #[tokio::test]
    async fn gateway_error_becomes_payment_initiation_error() {
        let (order, items) = order();
        let request = build_payment_request(&order, &items, &payment_config());
        let gateway = ScriptedGateway {
            fail: true,
            calls: AtomicUsize::new(0),
        };

        let err = request_approval(&gateway, &request)
            .await
            .expect_err("gateway failure");
        assert!(matches!(err, AppError::PaymentInitiation(_)));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1, "no retry");
    }

    #[tokio::test]
    async fn gateway_success_returns_redirect() {
        let (order, items) = order();
        let request = build_payment_request(&order, &items, &payment_config());
        let gateway = ScriptedGateway {
            fail: false,
            calls: AtomicUsize::new(0),
        };

        let approval = request_approval(&gateway, &request).await.expect("approval");
        assert_eq!(approval.approval_url, "https://gateway.test/approve");
        assert_eq!(approval.reference, "PAY-INV-20260101-deadbeef");
    }
}
