use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    entity::product_variants::Model as VariantModel,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub unit_price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub lines: Vec<PricedLine>,
    pub total_amount: i64,
}

/// Folds repeated variants into one line, keeping first-seen order.
pub fn merge_requests(requests: &[LineRequest]) -> AppResult<Vec<LineRequest>> {
    let mut merged: Vec<LineRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        if request.quantity <= 0 {
            return Err(AppError::bad_request(format!(
                "quantity for variant {} must be greater than 0",
                request.variant_id
            )));
        }
        match merged.iter_mut().find(|line| line.variant_id == request.variant_id) {
            Some(line) if line.product_id != request.product_id => {
                return Err(AppError::bad_request(format!(
                    "variant {} listed under two products",
                    request.variant_id
                )));
            }
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(request.quantity)
                    .ok_or_else(|| AppError::bad_request("quantity out of range"))?;
            }
            None => merged.push(*request),
        }
    }
    Ok(merged)
}

pub fn snapshot(
    requests: &[LineRequest],
    catalog: &HashMap<Uuid, VariantModel>,
) -> AppResult<PriceSnapshot> {
    if requests.is_empty() {
        return Err(AppError::bad_request("order has no items"));
    }

    let mut lines = Vec::with_capacity(requests.len());
    let mut total_amount: i64 = 0;
    for request in requests {
        if request.quantity <= 0 {
            return Err(AppError::bad_request(format!(
                "quantity for variant {} must be greater than 0",
                request.variant_id
            )));
        }
        let variant = catalog.get(&request.variant_id).ok_or_else(|| {
            AppError::bad_request(format!("variant {} not found", request.variant_id))
        })?;
        if variant.product_id != request.product_id {
            return Err(AppError::bad_request(format!(
                "variant {} does not belong to product {}",
                request.variant_id, request.product_id
            )));
        }
        if variant.stock < request.quantity {
            return Err(AppError::bad_request(format!(
                "insufficient stock for variant {}",
                request.variant_id
            )));
        }

        total_amount = variant
            .price
            .checked_mul(i64::from(request.quantity))
            .and_then(|extension| total_amount.checked_add(extension))
            .ok_or_else(|| AppError::bad_request("order total out of range"))?;

        lines.push(PricedLine {
            product_id: variant.product_id,
            variant_id: variant.id,
            unit_price: variant.price,
            quantity: request.quantity,
        });
    }

    Ok(PriceSnapshot {
        lines,
        total_amount,
    })
}
