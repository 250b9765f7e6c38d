use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, OrderReview, OrderWithItems},
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Column as ProdCol,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, PaymentStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service,
    state::AppState,
    validation,
};

#[derive(Debug, FromQueryResult)]
struct CartProductRow {
    product_id: Uuid,
    quantity: i32,
    name: String,
    price: Decimal,
}

pub async fn review_order(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderReview>> {
    let items = cart_service::list_items(&state.pool, user.user_id).await?;
    let total = cart_service::compute_total(
        items.iter().map(|item| (item.product.price, item.quantity)),
    );
    let message = if items.is_empty() {
        "Your cart is empty"
    } else {
        "Review your order"
    };

    Ok(ApiResponse::success(
        message,
        OrderReview {
            items,
            total,
            currency: state.config.payment.currency.clone(),
        },
        Some(Meta::empty()),
    ))
}

/// Move the user's cart into a new order in one transaction.
///
/// The order row, its line items and the cart deletion commit together; any
/// error drops the transaction, which rolls everything back and leaves the
/// cart as it was.
pub async fn confirm_order(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    // Locking the cart rows serializes concurrent confirmations of the same cart.
    let rows = CartItems::find()
        .select_only()
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::Quantity, "quantity")
        .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
        .column_as(ProdCol::Name, "name")
        .column_as(ProdCol::Price, "price")
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .lock(LockType::Update)
        .into_model::<CartProductRow>()
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let total_amount = cart_service::compute_total(rows.iter().map(|row| (row.price, row.quantity)));
    if total_amount > validation::max_amount() {
        return Err(AppError::validation(
            "total",
            &format!("orders are limited to {}", validation::max_amount()),
        ));
    }

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        invoice_number: Set(build_invoice_number(order_id)),
        total_amount: Set(total_amount),
        currency: Set(state.config.payment.currency.clone()),
        payment_status: Set(PaymentStatus::Unpaid.as_str().into()),
        payment_reference: Set(None),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            product_name: Set(row.name),
            unit_price: Set(row.price),
            quantity: Set(row.quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    // clear cart
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        total = %order.total_amount,
        lines = items.len(),
        "order confirmed"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "order_confirm",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order confirmed",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.payment_status {
        condition = condition.add(OrderCol::PaymentStatus.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_user_order(&state.orm, user.user_id, id).await?;
    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Orders of other users are reported as missing.
pub(crate) async fn find_user_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    id: Uuid,
) -> AppResult<OrderModel> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub(crate) async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let payment_status = PaymentStatus::parse(&model.payment_status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "unknown payment status {:?} on order {}",
            model.payment_status,
            model.id
        ))
    })?;

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        invoice_number: model.invoice_number,
        total_amount: model.total_amount,
        currency: model.currency,
        payment_status,
        payment_reference: model.payment_reference,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        unit_price: model.unit_price,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn build_invoice_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    let short = &suffix[..8];
    format!("INV-{}-{}", date, short)
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn order_model(status: &str) -> OrderModel {
        let now = Utc::now().with_timezone(&FixedOffset::east_opt(0).expect("utc offset"));
        OrderModel {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            invoice_number: "INV-20260101-00000000".into(),
            total_amount: Decimal::new(25, 0),
            currency: "USD".into(),
            payment_status: status.into(),
            payment_reference: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn invoice_number_has_date_and_id_prefix() {
        let id = Uuid::new_v4();
        let invoice = build_invoice_number(id);
        let parts: Vec<_> = invoice.split('-').collect();
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2], &id.simple().to_string()[..8]);
    }

    #[test]
    fn entity_status_maps_to_enum() {
        let order = order_from_entity(order_model("pending")).expect("known status");
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total_amount, Decimal::new(25, 0));
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!(order_from_entity(order_model("refunded")).is_err());
    }
}
