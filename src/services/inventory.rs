//! Stock counter on `product_variants`. Every write is one conditional `UPDATE`.

use chrono::Utc;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, sea_query::Expr};
use uuid::Uuid;

use crate::{
    entity::{
        order_lines::Model as OrderLineModel,
        product_variants::{Column as VariantCol, Entity as ProductVariants},
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debit {
    Applied,
    Insufficient,
}

/// Atomically take `quantity` units if at least that many are available.
pub async fn decrement_if_available<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
    quantity: i32,
) -> AppResult<Debit> {
    if quantity <= 0 {
        return Err(AppError::bad_request("quantity must be greater than 0"));
    }
    let result = ProductVariants::update_many()
        .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).sub(quantity))
        .col_expr(VariantCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(VariantCol::Id.eq(variant_id))
        .filter(VariantCol::Stock.gte(quantity))
        .exec(conn)
        .await?;

    Ok(if result.rows_affected == 1 {
        Debit::Applied
    } else {
        Debit::Insufficient
    })
}

pub async fn release<C: ConnectionTrait>(conn: &C, variant_id: Uuid, quantity: i32) -> AppResult<()> {
    if quantity <= 0 {
        return Err(AppError::bad_request("quantity must be greater than 0"));
    }
    let result = ProductVariants::update_many()
        .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).add(quantity))
        .col_expr(VariantCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(VariantCol::Id.eq(variant_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn available<C: ConnectionTrait>(conn: &C, variant_id: Uuid) -> AppResult<i32> {
    let stock: Option<i32> = ProductVariants::find_by_id(variant_id)
        .select_only()
        .column(VariantCol::Stock)
        .into_tuple()
        .one(conn)
        .await?;
    stock.ok_or(AppError::NotFound)
}

/// First shortfall aborts with `Conflict`; the caller rolls back earlier debits.
pub async fn debit_lines<C: ConnectionTrait>(conn: &C, lines: &[OrderLineModel]) -> AppResult<()> {
    for line in lines {
        if decrement_if_available(conn, line.variant_id, line.quantity).await?
            == Debit::Insufficient
        {
            return Err(AppError::conflict(format!(
                "insufficient stock for variant {}",
                line.variant_id
            )));
        }
    }
    Ok(())
}

pub async fn release_lines<C: ConnectionTrait>(conn: &C, lines: &[OrderLineModel]) -> AppResult<()> {
    for line in lines {
        release(conn, line.variant_id, line.quantity).await?;
    }
    Ok(())
}
