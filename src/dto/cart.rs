use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    /// 1..=100; merged into an existing line for the same variant.
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// Absolute quantity, 1..=100.
    pub quantity: i32,
}
