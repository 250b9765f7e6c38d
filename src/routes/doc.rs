use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList, QuantityRequest, RemoveResult},
        checkout::{CheckoutRequest, CheckoutResponse},
        orders::{OrderList, OrderReview, OrderWithItems},
        products,
    },
    error::FieldError,
    models::{CartItem, Order, OrderItem, PaymentStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, checkout, health, home, orders, params, products as product_routes},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        home::home,
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::add_product_to_cart,
        cart::remove_from_cart,
        orders::review_order,
        orders::confirm_order,
        orders::list_orders,
        orders::get_order,
        checkout::checkout,
        checkout::payment_success,
        checkout::payment_cancel
    ),
    components(
        schemas(
            User,
            Product,
            CartItem,
            Order,
            OrderItem,
            PaymentStatus,
            FieldError,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            QuantityRequest,
            CartItemDto,
            CartList,
            RemoveResult,
            OrderReview,
            OrderWithItems,
            OrderList,
            CheckoutRequest,
            CheckoutResponse,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            products::CreateProductRequest,
            products::UpdateProductRequest,
            products::ProductList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<products::ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderReview>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Home", description = "Storefront landing"),
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and logout"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order review, confirmation and history"),
        (name = "Checkout", description = "Payment gateway redirect and return routes"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_storefront_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/cart",
            "/add_to_cart/{product_id}",
            "/remove_from_cart/{cart_id}",
            "/review_order",
            "/confirm_order",
            "/checkout",
            "/checkout/success",
            "/products/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
