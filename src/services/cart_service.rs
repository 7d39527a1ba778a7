use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    cache::{self, keys},
    dto::cart::{AddCartItemRequest, UpdateCartItemRequest},
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
    },
    error::{AppError, AppResult},
    models::{Cart, CartItem, MAX_CART_ITEM_QUANTITY},
    services::catalog_service,
    state::AppState,
};

fn validate_quantity(quantity: i32) -> AppResult<()> {
    if !(1..=MAX_CART_ITEM_QUANTITY).contains(&quantity) {
        return Err(AppError::bad_request(format!(
            "quantity must be between 1 and {MAX_CART_ITEM_QUANTITY}"
        )));
    }
    Ok(())
}

pub async fn create_cart(state: &AppState, user_id: Uuid) -> AppResult<Cart> {
    let existing = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict(format!("user {user_id} already has a cart")));
    }

    let now = Utc::now();
    // A concurrent create loses on the unique user_id index and maps to Conflict.
    let cart = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(cart_id = %cart.id, user_id = %user_id, "cart created");
    cache::invalidate(state.cache.as_ref(), &cache::cart_keys(cart.id, user_id)).await;
    audit::record(
        &state.orm,
        Some(user_id),
        "cart_create",
        &format!("cart:{}", cart.id),
        json!({}),
    )
    .await;

    Ok(cart_from_entity(cart, Vec::new()))
}

pub async fn get_cart(state: &AppState, cart_id: Uuid) -> AppResult<Cart> {
    let key = keys::cart(cart_id);
    if let Some(cart) = cache::get_json::<Cart>(state.cache.as_ref(), &key).await {
        return Ok(cart);
    }

    let model = Carts::find_by_id(cart_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let read_version = model.updated_at;
    let cart = assemble(&state.orm, model).await?;
    fill_cache(state, &key, &cart, read_version).await;
    Ok(cart)
}

pub async fn get_cart_by_user(state: &AppState, user_id: Uuid) -> AppResult<Cart> {
    let key = keys::user_cart(user_id);
    if let Some(cart) = cache::get_json::<Cart>(state.cache.as_ref(), &key).await {
        return Ok(cart);
    }

    let model = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let read_version = model.updated_at;
    let cart = assemble(&state.orm, model).await?;
    fill_cache(state, &key, &cart, read_version).await;
    Ok(cart)
}

pub async fn add_item(
    state: &AppState,
    cart_id: Uuid,
    user_id: Uuid,
    payload: AddCartItemRequest,
) -> AppResult<CartItem> {
    validate_quantity(payload.quantity)?;

    let txn = state.orm.begin().await?;
    let cart = lock_owned_cart(&txn, cart_id, user_id).await?;

    let variant =
        catalog_service::find_variant(&txn, payload.product_id, payload.variant_id).await?;
    if variant.is_none() {
        return Err(AppError::bad_request(format!(
            "variant {} not found for product {}",
            payload.variant_id, payload.product_id
        )));
    }

    let now = Utc::now();
    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .filter(CartItemCol::VariantId.eq(payload.variant_id))
        .one(&txn)
        .await?;
    let item = match existing {
        Some(item) => {
            let combined = item
                .quantity
                .checked_add(payload.quantity)
                .filter(|q| *q <= MAX_CART_ITEM_QUANTITY)
                .ok_or_else(|| {
                    AppError::bad_request(format!(
                        "quantity for variant {} would exceed {MAX_CART_ITEM_QUANTITY}",
                        payload.variant_id
                    ))
                })?;
            let mut active: CartItemActive = item.into();
            active.quantity = Set(combined);
            active.updated_at = Set(now.into());
            active.update(&txn).await?
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                product_id: Set(payload.product_id),
                variant_id: Set(payload.variant_id),
                quantity: Set(payload.quantity),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;
    after_mutation(state, &cart, "cart_add_item", json!({
        "item_id": item.id,
        "variant_id": item.variant_id,
        "added": payload.quantity,
        "quantity": item.quantity,
    }))
    .await;

    Ok(item_from_entity(item))
}

pub async fn update_item(
    state: &AppState,
    cart_id: Uuid,
    user_id: Uuid,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<CartItem> {
    validate_quantity(payload.quantity)?;

    let txn = state.orm.begin().await?;
    let cart = lock_owned_cart(&txn, cart_id, user_id).await?;

    let item = CartItems::find_by_id(item_id)
        .filter(CartItemCol::CartId.eq(cart_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.updated_at = Set(Utc::now().into());
    let item = active.update(&txn).await?;

    txn.commit().await?;
    after_mutation(state, &cart, "cart_update_item", json!({
        "item_id": item.id,
        "quantity": item.quantity,
    }))
    .await;

    Ok(item_from_entity(item))
}

pub async fn remove_item(
    state: &AppState,
    cart_id: Uuid,
    user_id: Uuid,
    item_id: Uuid,
) -> AppResult<()> {
    let txn = state.orm.begin().await?;
    let cart = lock_owned_cart(&txn, cart_id, user_id).await?;

    let result = CartItems::delete_many()
        .filter(CartItemCol::Id.eq(item_id))
        .filter(CartItemCol::CartId.eq(cart_id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    txn.commit().await?;
    after_mutation(state, &cart, "cart_remove_item", json!({ "item_id": item_id })).await;
    Ok(())
}

// Touching the row takes its write lock, so mutations on one cart run in turn.
async fn lock_owned_cart(
    txn: &DatabaseTransaction,
    cart_id: Uuid,
    user_id: Uuid,
) -> AppResult<CartModel> {
    let touched = Carts::update_many()
        .col_expr(CartCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(CartCol::Id.eq(cart_id))
        .exec(txn)
        .await?;
    if touched.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    let cart = Carts::find_by_id(cart_id)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;
    if cart.user_id != user_id {
        tracing::warn!(cart_id = %cart_id, user_id = %user_id, "cart ownership violation");
        return Err(AppError::Forbidden);
    }
    Ok(cart)
}

// Drop the entry again if a mutation committed since the read.
async fn fill_cache(state: &AppState, key: &str, cart: &Cart, read_version: DateTimeWithTimeZone) {
    cache::put_json(state.cache.as_ref(), key, cart, state.cart_cache_ttl).await;
    let current: Option<DateTimeWithTimeZone> = Carts::find_by_id(cart.id)
        .select_only()
        .column(CartCol::UpdatedAt)
        .into_tuple()
        .one(&state.orm)
        .await
        .ok()
        .flatten();
    if current != Some(read_version) {
        tracing::debug!(cart_id = %cart.id, "cart changed during cache fill");
        cache::invalidate(state.cache.as_ref(), &[key.to_string()]).await;
    }
}

async fn after_mutation(state: &AppState, cart: &CartModel, action: &str, metadata: serde_json::Value) {
    cache::invalidate(state.cache.as_ref(), &cache::cart_keys(cart.id, cart.user_id)).await;
    tracing::info!(cart_id = %cart.id, action, "cart updated");
    audit::record(
        &state.orm,
        Some(cart.user_id),
        action,
        &format!("cart:{}", cart.id),
        metadata,
    )
    .await;
}

async fn assemble<C: ConnectionTrait>(conn: &C, cart: CartModel) -> AppResult<Cart> {
    let items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .order_by_asc(CartItemCol::Id)
        .all(conn)
        .await?;
    Ok(cart_from_entity(cart, items))
}

fn cart_from_entity(model: CartModel, items: Vec<CartItemModel>) -> Cart {
    Cart {
        id: model.id,
        user_id: model.user_id,
        items: items.into_iter().map(item_from_entity).collect(),
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    }
}

fn item_from_entity(model: CartItemModel) -> CartItem {
    CartItem {
        id: model.id,
        cart_id: model.cart_id,
        product_id: model.product_id,
        variant_id: model.variant_id,
        quantity: model.quantity,
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    }
}
