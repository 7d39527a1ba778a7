use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderLine, OrderStatus, PaymentProvider};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    pub payment_provider: PaymentProvider,
    /// Where the gateway sends the buyer afterwards. Required for gateway
    /// payments, ignored for cash on delivery.
    #[serde(default)]
    pub return_url: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub address: Option<String>,
    pub status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithLines {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentUrlResponse {
    pub order_id: Uuid,
    pub payment_url: String,
}
