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
        cart::{AddCartItemRequest, UpdateCartItemRequest},
        orders::{
            CreateOrderRequest, OrderItemRequest, OrderList, OrderWithLines, PaymentUrlResponse,
            UpdateOrderRequest,
        },
        products::ProductList,
    },
    models::{
        Cart, CartItem, Order, OrderLine, OrderStatus, PaymentProvider, Product, ProductVariant,
        User,
    },
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, orders, params, payments, products as product_routes},
    services::ipn_service::IpnAck,
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
        health::health_check,
        auth::login,
        auth::register,
        product_routes::list_products,
        product_routes::get_product,
        cart::create_cart,
        cart::my_cart,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::issue_payment_url,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order,
        payments::vnpay_ipn
    ),
    components(
        schemas(
            User,
            Product,
            ProductVariant,
            Cart,
            CartItem,
            Order,
            OrderLine,
            OrderStatus,
            PaymentProvider,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddCartItemRequest,
            UpdateCartItemRequest,
            CreateOrderRequest,
            OrderItemRequest,
            UpdateOrderRequest,
            OrderList,
            OrderWithLines,
            PaymentUrlResponse,
            ProductList,
            IpnAck,
            params::Pagination,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<CartItem>,
            ApiResponse<OrderWithLines>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentUrlResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Read-only catalog"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Payments", description = "Payment gateway callbacks"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
