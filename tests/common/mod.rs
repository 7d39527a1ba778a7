#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use storefront_api::{
    cache::InMemoryCache,
    config::VnpayConfig,
    db::create_memory_conn,
    dto::orders::{CreateOrderRequest, OrderItemRequest},
    entity::{
        product_variants::{ActiveModel as VariantActive, Model as VariantModel},
        products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    models::PaymentProvider,
    services::{
        inventory,
        payment::{IpnFields, MockPaymentGateway, PaymentGateway, VnpayGateway},
    },
    state::AppState,
};
use uuid::Uuid;

pub const PAY_URL: &str = "https://sandbox.example/paymentv2/vpcpay.html";
pub const RETURN_URL: &str = "https://shop.example/checkout/return";

pub fn vnpay() -> VnpayGateway {
    VnpayGateway::new(VnpayConfig {
        tmn_code: "TESTTMN1".into(),
        hash_secret: "TESTHASHSECRET".into(),
        pay_url: PAY_URL.into(),
        locale: "vn".into(),
    })
}

/// Fresh migrated in-memory database behind `gateway`.
pub async fn state_with(gateway: impl PaymentGateway + 'static) -> anyhow::Result<AppState> {
    let orm = create_memory_conn().await?;
    Ok(AppState::new(orm, Arc::new(InMemoryCache::new()), Arc::new(gateway)))
}

/// A mock with no expectations: any gateway call fails the test.
pub async fn cod_only_state() -> anyhow::Result<AppState> {
    state_with(MockPaymentGateway::new()).await
}

pub async fn vnpay_state() -> anyhow::Result<AppState> {
    state_with(vnpay()).await
}

/// Same database, different gateway.
pub fn swap_gateway(state: &AppState, gateway: impl PaymentGateway + 'static) -> AppState {
    AppState::new(state.orm.clone(), state.cache.clone(), Arc::new(gateway))
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        password_hash: Set("not-a-real-hash".into()),
        role: Set(role.into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(id)
}

/// A product with a single variant.
pub async fn create_variant(state: &AppState, price: i64, stock: i32) -> anyhow::Result<VariantModel> {
    let now = Utc::now();
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Product {}", Uuid::new_v4())),
        description: Set(Some("test product".into())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    let variant = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        sku: Set(format!("SKU-{}", Uuid::new_v4())),
        name: Set("Default".into()),
        price: Set(price),
        stock: Set(stock),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(variant)
}

pub async fn stock_of(state: &AppState, variant_id: Uuid) -> anyhow::Result<i32> {
    Ok(inventory::available(&state.orm, variant_id).await?)
}

pub fn checkout(provider: PaymentProvider, lines: &[(&VariantModel, i32)]) -> CreateOrderRequest {
    CreateOrderRequest {
        recipient_name: "Le Van C".into(),
        phone: "+84912345678".into(),
        address: "99 Hai Ba Trung, Ha Noi".into(),
        payment_provider: provider,
        return_url: RETURN_URL.into(),
        items: lines
            .iter()
            .map(|(variant, quantity)| OrderItemRequest {
                product_id: variant.product_id,
                variant_id: variant.id,
                quantity: *quantity,
            })
            .collect(),
    }
}

/// Callback fields as the gateway would send them, signed with the test key.
pub fn ipn_fields(
    order_ref: &str,
    amount: i64,
    response_code: &str,
    transaction_status: &str,
) -> IpnFields {
    let mut fields = IpnFields::new();
    fields.insert("vnp_TmnCode".into(), "TESTTMN1".into());
    fields.insert("vnp_Amount".into(), (amount * 100).to_string());
    fields.insert("vnp_BankCode".into(), "NCB".into());
    fields.insert("vnp_BankTranNo".into(), "VNP14422574".into());
    fields.insert("vnp_CardType".into(), "ATM".into());
    fields.insert("vnp_OrderInfo".into(), format!("Thanh toan don hang {order_ref}"));
    fields.insert("vnp_PayDate".into(), "20250101103000".into());
    fields.insert("vnp_ResponseCode".into(), response_code.into());
    fields.insert("vnp_TransactionNo".into(), "14422574".into());
    fields.insert("vnp_TransactionStatus".into(), transaction_status.into());
    fields.insert("vnp_TxnRef".into(), order_ref.into());
    let hash = vnpay().signature(&fields).unwrap();
    fields.insert("vnp_SecureHashType".into(), "HmacSHA512".into());
    fields.insert("vnp_SecureHash".into(), hash);
    fields
}
