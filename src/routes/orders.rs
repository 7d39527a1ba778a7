use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderList, OrderWithLines, PaymentUrlResponse},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    response::ApiResponse,
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::{self, OrderFilter},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order))
        .route("/{id}/payment-url", post(issue_payment_url))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Pending order; gateway orders carry a payment url", body = ApiResponse<OrderWithLines>),
        (status = 400, description = "Invalid recipient, items or stock"),
        (status = 503, description = "Order saved but the gateway did not answer")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderWithLines>>)> {
    let created = order_service::create_order(&state, user.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Order created", created))))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders of the current user", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let pagination = query.pagination();
    let filter = OrderFilter {
        user_ids: vec![user.user_id],
        statuses: query.status.into_iter().collect(),
        ..Default::default()
    };
    let (items, total) = order_service::list_orders(
        &state,
        &filter,
        pagination,
        query.sort_order.unwrap_or(SortOrder::Desc),
    )
    .await?;
    Ok(Json(ApiResponse::page(
        "Orders",
        OrderList { items },
        pagination,
        total,
    )))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its lines", body = ApiResponse<OrderWithLines>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithLines>>> {
    let order = order_service::get_order(&state, id).await?;
    ensure_owner_or_admin(&user, order.order.user_id)?;
    Ok(Json(ApiResponse::ok("Order", order)))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/payment-url",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Fresh gateway redirect", body = ApiResponse<PaymentUrlResponse>),
        (status = 400, description = "Order is not awaiting gateway payment"),
        (status = 403, description = "Not the owner"),
        (status = 503, description = "Gateway unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn issue_payment_url(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentUrlResponse>>> {
    let payment_url = order_service::issue_payment_url(&state, id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(
        "Payment url",
        PaymentUrlResponse {
            order_id: id,
            payment_url,
        },
    )))
}
