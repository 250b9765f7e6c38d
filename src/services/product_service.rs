use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::dto::products::{CreateProductRequest, ProductList, UpdateProductRequest};
use crate::{
    audit,
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
    validation,
};

/// Filters shared by the listing query and its count.
fn catalog_filter(query: &ProductQuery) -> Condition {
    let search = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let like = format!("%{term}%");
            Condition::any()
                .add(Expr::col(Column::Name).ilike(like.clone()))
                .add(Expr::col(Column::Description).ilike(like))
        });

    Condition::all()
        .add_option(search)
        .add_option(query.min_price.map(|floor| Column::Price.gte(floor)))
        .add_option(query.max_price.map(|ceiling| Column::Price.lte(ceiling)))
}

/// Newest first unless the client asks otherwise.
fn catalog_order(query: &ProductQuery) -> (Column, Order) {
    let column = match query.sort_by {
        Some(ProductSortBy::Price) => Column::Price,
        Some(ProductSortBy::Name) => Column::Name,
        Some(ProductSortBy::CreatedAt) | None => Column::CreatedAt,
    };
    let direction = match query.sort_order {
        Some(SortOrder::Asc) => Order::Asc,
        Some(SortOrder::Desc) | None => Order::Desc,
    };
    (column, direction)
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, per_page, offset) = query.pagination().normalize();
    let (column, direction) = catalog_order(&query);

    let select = Products::find()
        .filter(catalog_filter(&query))
        .order_by(column, direction);
    let matching = select.clone().count(&state.orm).await?;

    let items = select
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, per_page, matching as i64)),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let new_product = validation::new_product(payload)?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(new_product.name),
        description: Set(new_product.description),
        price: Set(new_product.price),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await.map_err(duplicate_name)?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Price edits only affect carts; order lines keep the price they were bought at.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let payload = validation::product_update(payload)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        let description = description.trim().to_string();
        active.description = Set((!description.is_empty()).then_some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }

    let product = active.update(&state.orm).await.map_err(duplicate_name)?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| match err.sql_err() {
            Some(sea_orm::SqlErr::ForeignKeyConstraintViolation(_)) => AppError::BadRequest(
                "Product appears in existing orders and cannot be deleted".into(),
            ),
            _ => AppError::OrmError(err),
        })?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn duplicate_name(err: sea_orm::DbErr) -> AppError {
    match err.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            AppError::validation("name", "a product with this name already exists")
        }
        _ => AppError::OrmError(err),
    }
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_defaults_to_newest_first() {
        let (column, direction) = catalog_order(&ProductQuery::default());
        assert!(matches!(column, Column::CreatedAt));
        assert!(matches!(direction, Order::Desc));
    }

    #[test]
    fn catalog_sorts_by_requested_column() {
        let query = ProductQuery {
            sort_by: Some(ProductSortBy::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        let (column, direction) = catalog_order(&query);
        assert!(matches!(column, Column::Price));
        assert!(matches!(direction, Order::Asc));
    }
}
