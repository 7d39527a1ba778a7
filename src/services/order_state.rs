use chrono::Utc;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, sea_query::Expr};
use uuid::Uuid;

use crate::{
    entity::{
        enums::OrderStatus,
        order_lines::{Column as OrderLineCol, Entity as OrderLines},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    services::inventory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    PaymentSucceeded,
    PaymentFailed,
    SetStatus(OrderStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryEffect {
    None,
    Debit,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub mark_paid: bool,
    pub inventory: InventoryEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("order cannot go from {from} on {event:?}")]
pub struct IllegalTransition {
    pub from: OrderStatus,
    pub event: OrderEvent,
}

impl From<IllegalTransition> for AppError {
    fn from(err: IllegalTransition) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Whether stock for this order has already left the inventory counter.
pub fn stock_committed(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Processing | OrderStatus::Shipping | OrderStatus::Delivered
    )
}

pub fn transition(from: OrderStatus, event: OrderEvent) -> Result<Transition, IllegalTransition> {
    use OrderStatus::*;

    let illegal = IllegalTransition { from, event };
    let (to, mark_paid, inventory) = match (from, event) {
        (Pending, OrderEvent::PaymentSucceeded) => (Processing, true, InventoryEffect::Debit),
        (Pending, OrderEvent::PaymentFailed) => (Cancelled, false, InventoryEffect::None),
        (Pending, OrderEvent::SetStatus(Processing)) => (Processing, false, InventoryEffect::Debit),
        (Pending, OrderEvent::SetStatus(Cancelled)) => (Cancelled, false, InventoryEffect::None),
        (Processing, OrderEvent::SetStatus(Shipping)) => (Shipping, false, InventoryEffect::None),
        (Shipping, OrderEvent::SetStatus(Delivered)) => (Delivered, false, InventoryEffect::None),
        (Processing | Shipping, OrderEvent::SetStatus(Cancelled)) => {
            (Cancelled, false, InventoryEffect::Release)
        }
        _ => return Err(illegal),
    };

    Ok(Transition {
        from,
        to,
        mark_paid,
        inventory,
    })
}

/// `false` when the order is no longer in `transition.from`. Run inside a transaction.
pub async fn commit_transition<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    transition: &Transition,
) -> AppResult<bool> {
    let mut update = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(transition.to.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()));
    if transition.mark_paid {
        update = update.col_expr(OrderCol::IsPaid, Expr::value(true));
    }
    let result = update
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::Status.eq(transition.from))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Ok(false);
    }

    if transition.inventory != InventoryEffect::None {
        let lines = OrderLines::find()
            .filter(OrderLineCol::OrderId.eq(order_id))
            .all(conn)
            .await?;
        match transition.inventory {
            InventoryEffect::Debit => inventory::debit_lines(conn, &lines).await?,
            InventoryEffect::Release => inventory::release_lines(conn, &lines).await?,
            InventoryEffect::None => {}
        }
    }

    tracing::info!(
        order_id = %order_id,
        from = %transition.from,
        to = %transition.to,
        "order status changed"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::enums::OrderStatus::*;

    const ALL: [OrderStatus; 5] = [Pending, Processing, Shipping, Delivered, Cancelled];

    #[test]
    fn payment_success_only_settles_pending_orders() {
        let t = transition(Pending, OrderEvent::PaymentSucceeded).unwrap();
        assert_eq!(t.to, Processing);
        assert!(t.mark_paid);
        assert_eq!(t.inventory, InventoryEffect::Debit);

        for from in [Processing, Shipping, Delivered, Cancelled] {
            assert!(transition(from, OrderEvent::PaymentSucceeded).is_err());
            assert!(transition(from, OrderEvent::PaymentFailed).is_err());
        }
    }

    #[test]
    fn payment_failure_cancels_without_touching_stock() {
        let t = transition(Pending, OrderEvent::PaymentFailed).unwrap();
        assert_eq!(t.to, Cancelled);
        assert!(!t.mark_paid);
        assert_eq!(t.inventory, InventoryEffect::None);
    }

    #[test]
    fn admin_path_is_linear() {
        assert!(transition(Pending, OrderEvent::SetStatus(Processing)).is_ok());
        assert!(transition(Processing, OrderEvent::SetStatus(Shipping)).is_ok());
        assert!(transition(Shipping, OrderEvent::SetStatus(Delivered)).is_ok());

        assert!(transition(Pending, OrderEvent::SetStatus(Delivered)).is_err());
        assert!(transition(Pending, OrderEvent::SetStatus(Shipping)).is_err());
        assert!(transition(Processing, OrderEvent::SetStatus(Delivered)).is_err());
        assert!(transition(Shipping, OrderEvent::SetStatus(Processing)).is_err());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for from in [Delivered, Cancelled] {
            for to in ALL {
                assert!(transition(from, OrderEvent::SetStatus(to)).is_err());
            }
        }
    }

    #[test]
    fn same_status_is_not_a_transition() {
        for status in ALL {
            assert!(transition(status, OrderEvent::SetStatus(status)).is_err());
        }
    }

    #[test]
    fn cancelling_after_debit_releases_stock() {
        assert_eq!(
            transition(Pending, OrderEvent::SetStatus(Cancelled)).unwrap().inventory,
            InventoryEffect::None
        );
        for from in [Processing, Shipping] {
            let t = transition(from, OrderEvent::SetStatus(Cancelled)).unwrap();
            assert_eq!(t.inventory, InventoryEffect::Release);
            assert!(stock_committed(from));
        }
        assert!(!stock_committed(Pending));
    }

    #[test]
    fn illegal_transition_is_invalid() {
        let err: AppError = transition(Cancelled, OrderEvent::PaymentSucceeded)
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
