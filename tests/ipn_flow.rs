mod common;

use storefront_api::{
    models::{OrderStatus, PaymentProvider},
    services::{inventory, ipn_service, order_service},
    state::AppState,
};
use uuid::Uuid;

use common::{checkout, create_user, create_variant, ipn_fields, stock_of, vnpay_state};

async fn rsp_code(state: &AppState, fields: &storefront_api::services::payment::IpnFields) -> String {
    match ipn_service::verify_ipn(state, fields).await {
        Ok(ack) => ack.rsp_code,
        Err(rejection) => rejection.ack.rsp_code,
    }
}

/// A pending gateway order for `quantity` units of a fresh variant.
async fn pending_order(
    state: &AppState,
    price: i64,
    stock: i32,
    quantity: i32,
) -> anyhow::Result<(Uuid, Uuid, i64)> {
    let user_id = create_user(state, "customer").await?;
    let variant = create_variant(state, price, stock).await?;
    let created = order_service::create_order(
        state,
        user_id,
        checkout(PaymentProvider::Vnpay, &[(&variant, quantity)]),
    )
    .await?;
    Ok((created.order.id, variant.id, created.order.total_amount))
}

#[tokio::test]
async fn successful_payment_settles_the_order() -> anyhow::Result<()> {
    let state = vnpay_state().await?;
    let (order_id, variant_id, total) = pending_order(&state, 200_000, 10, 3).await?;

    let ack = ipn_service::verify_ipn(&state, &ipn_fields(&order_id.to_string(), total, "00", "00"))
        .await?;
    assert_eq!(ack.rsp_code, "00");
    assert_eq!(ack.message, "Confirm Success");

    let order = order_service::get_order(&state, order_id).await?.order;
    assert_eq!(order.status, OrderStatus::Processing);
    assert!(order.is_paid);
    assert_eq!(stock_of(&state, variant_id).await?, 7);
    Ok(())
}

#[tokio::test]
async fn replayed_success_settles_once() -> anyhow::Result<()> {
    let state = vnpay_state().await?;
    let (order_id, variant_id, total) = pending_order(&state, 200_000, 10, 2).await?;
    let fields = ipn_fields(&order_id.to_string(), total, "00", "00");

    assert_eq!(rsp_code(&state, &fields).await, "00");
    for _ in 0..3 {
        assert_eq!(rsp_code(&state, &fields).await, "02");
    }

    let order = order_service::get_order(&state, order_id).await?.order;
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(stock_of(&state, variant_id).await?, 8);
    Ok(())
}

#[tokio::test]
async fn failed_payment_cancels_without_touching_stock() -> anyhow::Result<()> {
    let state = vnpay_state().await?;
    let (order_id, variant_id, total) = pending_order(&state, 90_000, 5, 1).await?;

    let ack = ipn_service::verify_ipn(&state, &ipn_fields(&order_id.to_string(), total, "24", "02"))
        .await?;
    assert_eq!(ack.rsp_code, "00");

    let order = order_service::get_order(&state, order_id).await?.order;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(!order.is_paid);
    assert_eq!(stock_of(&state, variant_id).await?, 5);

    // A late success for a cancelled order changes nothing.
    let late = ipn_fields(&order_id.to_string(), total, "00", "00");
    assert_eq!(rsp_code(&state, &late).await, "02");
    let order = order_service::get_order(&state, order_id).await?.order;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, variant_id).await?, 5);
    Ok(())
}

#[tokio::test]
async fn only_both_success_sentinels_count() -> anyhow::Result<()> {
    let state = vnpay_state().await?;
    for (response, status) in [("00", "01"), ("07", "00"), ("", "")] {
        let (order_id, variant_id, total) = pending_order(&state, 10_000, 3, 1).await?;
        let fields = ipn_fields(&order_id.to_string(), total, response, status);
        assert_eq!(rsp_code(&state, &fields).await, "00");

        let order = order_service::get_order(&state, order_id).await?.order;
        assert_eq!(order.status, OrderStatus::Cancelled, "{response}/{status}");
        assert!(!order.is_paid);
        assert_eq!(stock_of(&state, variant_id).await?, 3);
    }
    Ok(())
}

#[tokio::test]
async fn unverifiable_callbacks_have_no_effect() -> anyhow::Result<()> {
    let state = vnpay_state().await?;
    let (order_id, variant_id, total) = pending_order(&state, 10_000, 3, 1).await?;

    let mut tampered = ipn_fields(&order_id.to_string(), total, "00", "00");
    tampered.insert("vnp_ResponseCode".into(), "24".into());
    assert_eq!(rsp_code(&state, &tampered).await, "97");

    let wrong_amount = ipn_fields(&order_id.to_string(), total + 1, "00", "00");
    assert_eq!(rsp_code(&state, &wrong_amount).await, "04");

    let unknown = ipn_fields(&Uuid::new_v4().to_string(), total, "00", "00");
    assert_eq!(rsp_code(&state, &unknown).await, "01");

    let garbage = ipn_fields("not-an-order", total, "00", "00");
    assert_eq!(rsp_code(&state, &garbage).await, "01");

    let order = order_service::get_order(&state, order_id).await?.order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(!order.is_paid);
    assert_eq!(stock_of(&state, variant_id).await?, 3);
    Ok(())
}

#[tokio::test]
async fn stock_shortfall_at_settlement_rolls_everything_back() -> anyhow::Result<()> {
    let state = vnpay_state().await?;
    let (order_id, variant_id, total) = pending_order(&state, 10_000, 2, 2).await?;
    // Someone else took one unit after the order was placed.
    inventory::decrement_if_available(&state.orm, variant_id, 1).await?;

    let fields = ipn_fields(&order_id.to_string(), total, "00", "00");
    let rejection = ipn_service::verify_ipn(&state, &fields).await.unwrap_err();
    assert_eq!(rejection.ack.rsp_code, "99");

    let order = order_service::get_order(&state, order_id).await?.order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(!order.is_paid);
    assert_eq!(stock_of(&state, variant_id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_callbacks_settle_once() -> anyhow::Result<()> {
    let state = vnpay_state().await?;
    let (order_id, variant_id, total) = pending_order(&state, 10_000, 5, 2).await?;
    let fields = ipn_fields(&order_id.to_string(), total, "00", "00");

    let (a, b) = tokio::join!(rsp_code(&state, &fields), rsp_code(&state, &fields));
    let mut codes = vec![a, b];
    codes.sort();
    assert_eq!(codes, vec!["00".to_string(), "02".to_string()]);

    let order = order_service::get_order(&state, order_id).await?.order;
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(stock_of(&state, variant_id).await?, 3);
    Ok(())
}
