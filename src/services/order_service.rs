use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, Condition, ConnectionTrait,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, OrderWithLines, UpdateOrderRequest},
    entity::{
        order_lines::{
            ActiveModel as OrderLineActive, Column as OrderLineCol, Entity as OrderLines,
            Model as OrderLineModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    models::{Order, OrderLine, OrderStatus},
    routes::params::{Pagination, SortOrder},
    services::{
        catalog_service,
        order_state::{self, OrderEvent},
        pricing::{self, LineRequest},
    },
    state::AppState,
};

/// Empty lists mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub ids: Vec<Uuid>,
    pub user_ids: Vec<Uuid>,
    pub statuses: Vec<OrderStatus>,
}

/// `+` optional, then 8 to 15 digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (8..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

fn validate_checkout(payload: &CreateOrderRequest) -> AppResult<()> {
    if payload.recipient_name.trim().is_empty() {
        return Err(AppError::bad_request("recipient name is required"));
    }
    if !is_valid_phone(payload.phone.trim()) {
        return Err(AppError::bad_request("phone number is invalid"));
    }
    if payload.address.trim().is_empty() {
        return Err(AppError::bad_request("address is required"));
    }
    if payload.items.is_empty() {
        return Err(AppError::bad_request("order has no items"));
    }
    if payload.payment_provider.uses_gateway() {
        let url = payload.return_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(AppError::bad_request("return url must be an http(s) url"));
        }
    }
    Ok(())
}

/// The order is committed before the gateway is asked for a URL.
pub async fn create_order(
    state: &AppState,
    user_id: Uuid,
    payload: CreateOrderRequest,
) -> AppResult<OrderWithLines> {
    validate_checkout(&payload)?;
    let requests: Vec<LineRequest> = payload
        .items
        .iter()
        .map(|item| LineRequest {
            product_id: item.product_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
        })
        .collect();
    let requests = pricing::merge_requests(&requests)?;

    let txn = state.orm.begin().await?;

    let variant_ids: Vec<Uuid> = requests.iter().map(|r| r.variant_id).collect();
    let catalog = catalog_service::variants_by_id(&txn, &variant_ids).await?;
    let snapshot = pricing::snapshot(&requests, &catalog)?;

    let now = Utc::now();
    let return_url = if payload.payment_provider.uses_gateway() {
        payload.return_url.trim().to_string()
    } else {
        String::new()
    };
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        recipient_name: Set(payload.recipient_name.trim().to_string()),
        phone: Set(payload.phone.trim().to_string()),
        address: Set(payload.address.trim().to_string()),
        payment_provider: Set(payload.payment_provider),
        total_amount: Set(snapshot.total_amount),
        is_paid: Set(false),
        status: Set(OrderStatus::Pending),
        return_url: Set(return_url),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut lines = Vec::with_capacity(snapshot.lines.len());
    for priced in &snapshot.lines {
        let line = OrderLineActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(priced.product_id),
            variant_id: Set(priced.variant_id),
            unit_price: Set(priced.unit_price),
            quantity: Set(priced.quantity),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        lines.push(line_from_entity(line));
    }

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user_id,
        total_amount = order.total_amount,
        provider = ?order.payment_provider,
        "order created"
    );
    audit::record(
        &state.orm,
        Some(user_id),
        "order_create",
        &format!("order:{}", order.id),
        json!({ "total_amount": order.total_amount, "lines": lines.len() }),
    )
    .await;

    let mut order = order_from_entity(order);
    if order.payment_provider.uses_gateway() {
        order.payment_url = Some(request_payment_url(state, &order).await?);
    }

    Ok(OrderWithLines { order, lines })
}

async fn request_payment_url(state: &AppState, order: &Order) -> AppResult<String> {
    state.gateway.payment_url(order).await.map_err(|err| {
        tracing::warn!(order_id = %order.id, error = %err, "payment url request failed");
        AppError::Unavailable(format!("payment gateway unavailable for order {}", order.id))
    })
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<OrderWithLines> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let lines = load_lines(&state.orm, id).await?;
    Ok(OrderWithLines {
        order: order_from_entity(order),
        lines,
    })
}

pub async fn list_orders(
    state: &AppState,
    filter: &OrderFilter,
    pagination: Pagination,
    sort_order: SortOrder,
) -> AppResult<(Vec<Order>, i64)> {
    let (_, limit, offset) = pagination.normalize();
    let mut condition = Condition::all();
    if !filter.ids.is_empty() {
        condition = condition.add(OrderCol::Id.is_in(filter.ids.iter().copied()));
    }
    if !filter.user_ids.is_empty() {
        condition = condition.add(OrderCol::UserId.is_in(filter.user_ids.iter().copied()));
    }
    if !filter.statuses.is_empty() {
        condition = condition.add(OrderCol::Status.is_in(filter.statuses.iter().copied()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder
            .order_by_asc(OrderCol::CreatedAt)
            .order_by_asc(OrderCol::Id),
        SortOrder::Desc => finder
            .order_by_desc(OrderCol::CreatedAt)
            .order_by_desc(OrderCol::Id),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok((orders, total))
}

pub async fn update_order(
    state: &AppState,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<OrderWithLines> {
    let address = match payload.address.as_deref().map(str::trim) {
        Some("") => return Err(AppError::bad_request("address must not be empty")),
        other => other.map(str::to_string),
    };

    let txn = state.orm.begin().await?;

    let current = Orders::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    if current.status.is_terminal() {
        return Err(AppError::bad_request(format!(
            "order {id} is {} and can no longer change",
            current.status
        )));
    }
    if payload.is_paid == Some(false) && current.is_paid {
        return Err(AppError::bad_request("a paid order cannot be marked unpaid"));
    }
    // Gateway orders are paid only by a verified callback.
    if payload.is_paid == Some(true) && !current.is_paid && current.payment_provider.uses_gateway() {
        return Err(AppError::bad_request(format!(
            "order {id} is paid through the gateway and cannot be marked paid manually"
        )));
    }

    let mut changed_status = None;
    if let Some(status) = payload.status.filter(|s| *s != current.status) {
        let transition = order_state::transition(current.status, OrderEvent::SetStatus(status))?;
        if !order_state::commit_transition(&txn, id, &transition).await? {
            return Err(AppError::conflict(format!("order {id} changed concurrently")));
        }
        changed_status = Some(status);
    }

    let mut active = OrderActive {
        id: Unchanged(id),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    if let Some(address) = &address {
        active.address = Set(address.clone());
    }
    if payload.is_paid == Some(true) {
        active.is_paid = Set(true);
    }
    let order = active.update(&txn).await?;
    let lines = load_lines(&txn, id).await?;

    txn.commit().await?;

    tracing::info!(order_id = %id, status = %order.status, is_paid = order.is_paid, "order updated");
    audit::record(
        &state.orm,
        None,
        "order_update",
        &format!("order:{id}"),
        json!({
            "address": address,
            "status": changed_status.map(|s| s.as_str()),
            "is_paid": payload.is_paid,
        }),
    )
    .await;

    Ok(OrderWithLines {
        order: order_from_entity(order),
        lines,
    })
}

pub async fn issue_payment_url(state: &AppState, order_id: Uuid, user_id: Uuid) -> AppResult<String> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if order.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if !order.payment_provider.uses_gateway() {
        return Err(AppError::bad_request("order is paid on delivery"));
    }
    if order.status != OrderStatus::Pending || order.is_paid {
        return Err(AppError::bad_request(format!(
            "order {order_id} is no longer awaiting payment"
        )));
    }
    request_payment_url(state, &order_from_entity(order)).await
}

async fn load_lines<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderLine>> {
    let lines = OrderLines::find()
        .filter(OrderLineCol::OrderId.eq(order_id))
        .order_by_asc(OrderLineCol::CreatedAt)
        .order_by_asc(OrderLineCol::Id)
        .all(conn)
        .await?;
    Ok(lines.into_iter().map(line_from_entity).collect())
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        recipient_name: model.recipient_name,
        phone: model.phone,
        address: model.address,
        payment_provider: model.payment_provider,
        total_amount: model.total_amount,
        is_paid: model.is_paid,
        status: model.status,
        return_url: model.return_url,
        payment_url: None,
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    }
}

fn line_from_entity(model: OrderLineModel) -> OrderLine {
    OrderLine {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        variant_id: model.variant_id,
        unit_price: model.unit_price,
        quantity: model.quantity,
        created_at: model.created_at.into(),
    }
}
