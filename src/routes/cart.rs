use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddCartItemRequest, UpdateCartItemRequest},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    models::{Cart, CartItem},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/me", get(my_cart))
        .route("/{id}", get(get_cart))
        .route("/{id}/items", post(add_item))
        .route("/{id}/items/{item_id}", patch(update_item).delete(remove_item))
}

#[utoipa::path(
    post,
    path = "/api/carts",
    responses(
        (status = 201, description = "Empty cart for the current user", body = ApiResponse<Cart>),
        (status = 409, description = "User already has a cart")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn create_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<(StatusCode, Json<ApiResponse<Cart>>)> {
    let cart = cart_service::create_cart(&state, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Cart created", cart))))
}

#[utoipa::path(
    get,
    path = "/api/carts/me",
    responses(
        (status = 200, description = "Cart of the current user", body = ApiResponse<Cart>),
        (status = 404, description = "No cart yet")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn my_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let cart = cart_service::get_cart_by_user(&state, user.user_id).await?;
    Ok(Json(ApiResponse::ok("Cart", cart)))
}

#[utoipa::path(
    get,
    path = "/api/carts/{id}",
    params(("id" = Uuid, Path, description = "Cart id")),
    responses(
        (status = 200, description = "Cart with items", body = ApiResponse<Cart>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Cart not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let cart = cart_service::get_cart(&state, id).await?;
    ensure_owner_or_admin(&user, cart.user_id)?;
    Ok(Json(ApiResponse::ok("Cart", cart)))
}

#[utoipa::path(
    post,
    path = "/api/carts/{id}/items",
    params(("id" = Uuid, Path, description = "Cart id")),
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Resulting cart line", body = ApiResponse<CartItem>),
        (status = 400, description = "Unknown variant or quantity out of range"),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let item = cart_service::add_item(&state, id, user.user_id, payload).await?;
    Ok(Json(ApiResponse::ok("Item added", item)))
}

#[utoipa::path(
    patch,
    path = "/api/carts/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart id"),
        ("item_id" = Uuid, Path, description = "Cart item id")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Updated cart line", body = ApiResponse<CartItem>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let item = cart_service::update_item(&state, id, user.user_id, item_id, payload).await?;
    Ok(Json(ApiResponse::ok("Item updated", item)))
}

#[utoipa::path(
    delete,
    path = "/api/carts/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart id"),
        ("item_id" = Uuid, Path, description = "Cart item id")
    ),
    responses(
        (status = 204, description = "Item removed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    cart_service::remove_item(&state, id, user.user_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
