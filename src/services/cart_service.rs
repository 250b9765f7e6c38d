use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::cart::{CartItemDto, CartList, RemoveResult},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
    validation,
};

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    created_at: DateTime<Utc>,
}

impl From<CartWithProductRow> for CartItemDto {
    fn from(row: CartWithProductRow) -> Self {
        CartItemDto {
            id: row.cart_id,
            subtotal: line_subtotal(row.price, row.quantity),
            product: Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                price: row.price,
                created_at: row.created_at,
            },
            quantity: row.quantity,
        }
    }
}

pub fn line_subtotal(price: Decimal, quantity: i32) -> Decimal {
    price * Decimal::from(quantity)
}

/// Sum of `price × quantity`. An empty cart totals zero.
pub fn compute_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(price, quantity)| line_subtotal(price, quantity))
        .sum()
}

/// New quantity after removing `qty`, or `None` when the row must be deleted.
pub fn apply_decrement(current: i32, qty: i32) -> Option<i32> {
    let remaining = current.saturating_sub(qty);
    (remaining > 0).then_some(remaining)
}

/// Every cart line of a user with product data resolved, newest first.
pub async fn list_items(pool: &DbPool, user_id: Uuid) -> AppResult<Vec<CartItemDto>> {
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity,
               p.id AS product_id, p.name, p.description, p.price, p.created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC, ci.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CartItemDto::from).collect())
}

pub async fn compute_cart_total(pool: &DbPool, user_id: Uuid) -> AppResult<Decimal> {
    let items = list_items(pool, user_id).await?;
    Ok(compute_total(
        items.iter().map(|item| (item.product.price, item.quantity)),
    ))
}

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let all = list_items(&state.pool, user.user_id).await?;

    let total = compute_total(all.iter().map(|item| (item.product.price, item.quantity)));
    let count = all.len() as i64;
    let items = all
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, count);
    Ok(ApiResponse::success("OK", CartList { items, total }, Some(meta)))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: Option<i32>,
) -> AppResult<ApiResponse<CartItem>> {
    let quantity = validation::quantity(quantity)?;

    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::NotFound);
    }

    // Single statement so concurrent adds for the same product cannot lose an
    // increment. The WHERE keeps the accumulated line within MAX_QUANTITY; when
    // it does not hold, no row comes back.
    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        WHERE cart_items.quantity + EXCLUDED.quantity <= $5
        RETURNING id, user_id, product_id, quantity, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(validation::MAX_QUANTITY)
    .fetch_optional(&state.pool)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::NotFound,
        other => AppError::DbError(other),
    })?
    .ok_or_else(|| {
        AppError::validation(
            "quantity",
            &format!("a cart line holds at most {}", validation::MAX_QUANTITY),
        )
    })?;

    tracing::debug!(
        user_id = %user.user_id,
        product_id = %product_id,
        quantity = cart_item.quantity,
        "cart item added"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": product_id, "quantity": quantity }),
    )
    .await;

    Ok(ApiResponse::success("Item added to cart", cart_item, None))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    cart_id: Uuid,
    quantity: Option<i32>,
) -> AppResult<ApiResponse<RemoveResult>> {
    let quantity = validation::quantity(quantity)?;
    let mut tx = state.pool.begin().await?;

    // Rows of other users are indistinguishable from missing ones.
    let current: Option<(i32,)> = sqlx::query_as(
        "SELECT quantity FROM cart_items WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(cart_id)
    .bind(user.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (current,) = current.ok_or(AppError::NotFound)?;

    let result = match apply_decrement(current, quantity) {
        Some(remaining) => {
            sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
                .bind(cart_id)
                .bind(remaining)
                .execute(&mut *tx)
                .await?;
            RemoveResult {
                cart_id,
                quantity: remaining,
                removed: false,
            }
        }
        None => {
            sqlx::query("DELETE FROM cart_items WHERE id = $1")
                .bind(cart_id)
                .execute(&mut *tx)
                .await?;
            RemoveResult {
                cart_id,
                quantity: 0,
                removed: true,
            }
        }
    };

    tx.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_id": cart_id, "quantity": quantity }),
    )
    .await;

    let message = if result.removed {
        "Item removed from cart"
    } else {
        "Cart updated"
    };
    Ok(ApiResponse::success(message, result, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dollars(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(compute_total(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let total = compute_total(vec![(dollars(10), 2), (dollars(5), 1)]);
        assert_eq!(total, dollars(25));
    }

    #[test]
    fn total_keeps_cents_exact() {
        let total = compute_total(vec![(Decimal::new(1999, 2), 3), (Decimal::new(1, 2), 1)]);
        assert_eq!(total, Decimal::new(5998, 2));
    }

    #[test]
    fn decrement_keeps_row_above_zero() {
        assert_eq!(apply_decrement(3, 1), Some(2));
        assert_eq!(apply_decrement(5, 4), Some(1));
    }

    #[test]
    fn decrement_to_zero_or_below_deletes_row() {
        assert_eq!(apply_decrement(1, 1), None);
        assert_eq!(apply_decrement(2, 7), None);
        assert_eq!(apply_decrement(i32::MIN + 1, i32::MAX), None);
    }

    #[test]
    fn net_quantity_matches_clamped_sum() {
        // +2, -1, +3, -10, +1 on one product
        let ops: [i32; 5] = [2, -1, 3, -10, 1];
        let mut row: Option<i32> = None;
        let mut expected: i32 = 0;
        for op in ops {
            row = if op > 0 {
                Some(row.unwrap_or(0) + op)
            } else {
                row.and_then(|current| apply_decrement(current, -op))
            };
            expected = (expected + op).max(0);
        }
        assert_eq!(row.unwrap_or(0), expected);
        assert_eq!(expected, 1);
    }
}
