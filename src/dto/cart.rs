use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: Option<i32>,
}

/// Optional body of `/add_to_cart/{id}` and `/remove_from_cart/{id}`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct QuantityRequest {
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItemDto>,
    #[schema(value_type = String)]
    pub total: Decimal,
}

/// Outcome of a decrement: the row either survives with a new quantity or is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RemoveResult {
    pub cart_id: Uuid,
    pub quantity: i32,
    pub removed: bool,
}
