mod common;

use std::sync::Once;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use storefront_api::{
    routes::create_app,
    services::auth_service::{ROLE_ADMIN, ROLE_CUSTOMER, issue_token},
};
use tower::ServiceExt;
use uuid::Uuid;

use common::{create_user, create_variant, ipn_fields, vnpay_state};

static JWT: Once = Once::new();

fn init_jwt() {
    // SAFETY: set exactly once, before any test in this binary reads it.
    JWT.call_once(|| unsafe { std::env::set_var("JWT_SECRET", "http-api-test-secret") });
}

fn bearer(user_id: Uuid, role: &str) -> String {
    format!("Bearer {}", issue_token(user_id, role).unwrap())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> anyhow::Result<(StatusCode, Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, token);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

#[tokio::test]
async fn health_and_unknown_routes() -> anyhow::Result<()> {
    let app = create_app(vnpay_state().await?);

    let (status, body) = send(&app, "GET", "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "up");

    let (status, body) = send(&app, "GET", "/nowhere", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], "/nowhere");
    Ok(())
}

#[tokio::test]
async fn cart_endpoints_enforce_ownership() -> anyhow::Result<()> {
    init_jwt();
    let state = vnpay_state().await?;
    let owner = create_user(&state, ROLE_CUSTOMER).await?;
    let intruder = create_user(&state, ROLE_CUSTOMER).await?;
    let variant = create_variant(&state, 30_000, 10).await?;
    let app = create_app(state);
    let owner_token = bearer(owner, ROLE_CUSTOMER);
    let intruder_token = bearer(intruder, ROLE_CUSTOMER);

    let (status, _) = send(&app, "POST", "/api/carts", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/api/carts", Some(&owner_token), None).await?;
    assert_eq!(status, StatusCode::CREATED);
    let cart_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "POST", "/api/carts", Some(&owner_token), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let item = json!({ "product_id": variant.product_id, "variant_id": variant.id, "quantity": 2 });
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/carts/{cart_id}/items"),
        Some(&owner_token),
        Some(item.clone()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let item_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", &format!("/api/carts/{cart_id}/items"), Some(&owner_token), Some(item)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], 4);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/carts/{cart_id}/items/{item_id}"),
        Some(&intruder_token),
        Some(json!({ "quantity": 1 })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", &format!("/api/carts/{cart_id}"), Some(&intruder_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/carts/me", Some(&owner_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["quantity"], 4);

    let uri = format!("/api/carts/{cart_id}/items/{item_id}");
    let (status, _) = send(&app, "DELETE", &uri, Some(&owner_token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &uri, Some(&owner_token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn order_checkout_and_ipn_over_http() -> anyhow::Result<()> {
    init_jwt();
    let state = vnpay_state().await?;
    let buyer = create_user(&state, ROLE_CUSTOMER).await?;
    let admin = create_user(&state, ROLE_ADMIN).await?;
    let variant = create_variant(&state, 250_000, 5).await?;
    let app = create_app(state);
    let buyer_token = bearer(buyer, ROLE_CUSTOMER);
    let admin_token = bearer(admin, ROLE_ADMIN);

    let payload = json!({
        "recipient_name": "Pham D",
        "phone": "0912345678",
        "address": "3 Ly Thuong Kiet",
        "payment_provider": "vnpay",
        "return_url": common::RETURN_URL,
        "items": [{ "product_id": variant.product_id, "variant_id": variant.id, "quantity": 2 }]
    });
    let (status, body) = send(&app, "POST", "/api/orders", Some(&buyer_token), Some(payload)).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order"]["total_amount"], 500_000);
    assert_eq!(body["data"]["order"]["status"], "pending");
    assert!(body["data"]["order"]["payment_url"].as_str().unwrap().starts_with(common::PAY_URL));
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let query = serde_urlencoded::to_string(ipn_fields(&order_id, 500_000, "00", "00"))?;
    let (status, body) = send(&app, "GET", &format!("/api/payments/vnpay/ipn?{query}"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "RspCode": "00", "Message": "Confirm Success" }));

    let (status, body) = send(&app, "GET", &format!("/api/payments/vnpay/ipn?{query}"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["RspCode"], "02");

    let (status, body) = send(&app, "GET", &format!("/api/orders/{order_id}"), Some(&buyer_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["status"], "processing");
    assert_eq!(body["data"]["order"]["is_paid"], true);

    let (status, _) = send(&app, "GET", "/api/admin/orders", Some(&buyer_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/admin/orders?statuses=processing&user_ids={buyer}"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);

    let (status, _) = send(&app, "GET", "/api/admin/orders?statuses=lost", Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/admin/orders/{order_id}"),
        Some(&admin_token),
        Some(json!({ "status": "shipping" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["status"], "shipping");
    Ok(())
}

#[tokio::test]
async fn ipn_endpoint_always_answers_200() -> anyhow::Result<()> {
    let app = create_app(vnpay_state().await?);

    let (status, body) = send(&app, "GET", "/api/payments/vnpay/ipn", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["RspCode"], "97");

    let (status, body) = send(&app, "GET", "/api/payments/vnpay/ipn?vnp_TxnRef=abc&vnp_SecureHash=00", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["RspCode"], "97");
    Ok(())
}

#[tokio::test]
async fn register_login_and_browse_catalog() -> anyhow::Result<()> {
    init_jwt();
    let state = vnpay_state().await?;
    let variant = create_variant(&state, 120_000, 7).await?;
    create_variant(&state, 80_000, 3).await?;
    let app = create_app(state);

    let credentials = json!({ "email": "Buyer@Example.com", "password": "hunter2hunter2" });
    let (status, body) = send(&app, "POST", "/api/auth/register", None, Some(credentials.clone())).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], "buyer@example.com");
    assert_eq!(body["data"]["role"], ROLE_CUSTOMER);

    let (status, _) = send(&app, "POST", "/api/auth/register", None, Some(credentials.clone())).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let wrong = json!({ "email": "buyer@example.com", "password": "not-the-password" });
    let (status, _) = send(&app, "POST", "/api/auth/login", None, Some(wrong)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/api/auth/login", None, Some(credentials)).await?;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(token.starts_with("Bearer "));

    let (status, _) = send(&app, "POST", "/api/carts", Some(&token), None).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/api/products?per_page=1", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = send(&app, "GET", &format!("/api/products/{}", variant.product_id), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["variants"][0]["price"], 120_000);
    let name = body["data"]["name"].as_str().unwrap().to_lowercase();

    let search = name.trim_start_matches("product ");
    let (status, body) = send(&app, "GET", &format!("/api/products?q={search}"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["id"], variant.product_id.to_string());

    let (status, _) = send(&app, "GET", &format!("/api/products/{}", Uuid::new_v4()), None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
