use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, OrderWithLines, UpdateOrderRequest},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::ApiResponse,
    routes::params::{AdminOrderListQuery, SortOrder},
    services::order_service::{self, OrderFilter},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin).patch(update_order))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(AdminOrderListQuery),
    responses(
        (status = 200, description = "Orders matching every given filter", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AdminOrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_admin(&user)?;
    let filter = OrderFilter {
        ids: query.ids()?,
        user_ids: query.user_ids()?,
        statuses: query.statuses()?,
    };
    let pagination = query.pagination();
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
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its lines", body = ApiResponse<OrderWithLines>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithLines>>> {
    ensure_admin(&user)?;
    let order = order_service::get_order(&state, id).await?;
    Ok(Json(ApiResponse::ok("Order", order)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Updated order", body = ApiResponse<OrderWithLines>),
        (status = 400, description = "Transition not allowed"),
        (status = 409, description = "Order changed concurrently or stock ran out")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderWithLines>>> {
    ensure_admin(&user)?;
    let order = order_service::update_order(&state, id, payload).await?;
    Ok(Json(ApiResponse::ok("Order updated", order)))
}
