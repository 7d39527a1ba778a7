use sea_orm::{EntityTrait, TransactionTrait};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audit,
    entity::Orders,
    error::AppError,
    models::OrderStatus,
    services::{
        order_state::{self, OrderEvent},
        payment::{GatewayError, IpnFields, PaymentOutcome},
    },
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    Confirmed,
    OrderNotFound,
    AlreadyConfirmed,
    InvalidAmount,
    InvalidSignature,
    Unknown,
}

impl AckCode {
    pub fn code(&self) -> &'static str {
        match self {
            AckCode::Confirmed => "00",
            AckCode::OrderNotFound => "01",
            AckCode::AlreadyConfirmed => "02",
            AckCode::InvalidAmount => "04",
            AckCode::InvalidSignature => "97",
            AckCode::Unknown => "99",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AckCode::Confirmed => "Confirm Success",
            AckCode::OrderNotFound => "Order not found",
            AckCode::AlreadyConfirmed => "Order already confirmed",
            AckCode::InvalidAmount => "Invalid amount",
            AckCode::InvalidSignature => "Invalid signature",
            AckCode::Unknown => "Unknown error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IpnAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl From<AckCode> for IpnAck {
    fn from(code: AckCode) -> Self {
        Self {
            rsp_code: code.code().to_string(),
            message: code.message().to_string(),
        }
    }
}

/// `ack` goes back to the gateway, `cause` is only logged.
#[derive(Debug, Error)]
#[error("ipn rejected ({}): {cause}", ack.rsp_code)]
pub struct IpnRejection {
    pub ack: IpnAck,
    pub cause: AppError,
}

fn reject(code: AckCode, cause: AppError) -> IpnRejection {
    if code == AckCode::Unknown {
        tracing::error!(rsp_code = code.code(), error = ?cause, "ipn settlement failed");
    } else {
        tracing::warn!(rsp_code = code.code(), error = %cause, "ipn rejected");
    }
    IpnRejection {
        ack: code.into(),
        cause,
    }
}

pub async fn verify_ipn(state: &AppState, fields: &IpnFields) -> Result<IpnAck, IpnRejection> {
    let verified = state.gateway.verify_ipn(fields).await.map_err(|err| match err {
        GatewayError::InvalidSignature => {
            reject(AckCode::InvalidSignature, AppError::bad_request(err.to_string()))
        }
        other => reject(AckCode::Unknown, AppError::Internal(other.into())),
    })?;

    let order_id = Uuid::parse_str(&verified.txn_ref).map_err(|_| {
        reject(
            AckCode::OrderNotFound,
            AppError::bad_request(format!("unparsable txn ref {:?}", verified.txn_ref)),
        )
    })?;
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await
        .map_err(|err| reject(AckCode::Unknown, err.into()))?
        .ok_or_else(|| reject(AckCode::OrderNotFound, AppError::NotFound))?;

    if verified.amount != Some(order.total_amount) {
        return Err(reject(
            AckCode::InvalidAmount,
            AppError::bad_request(format!(
                "callback amount {:?} does not match order total {}",
                verified.amount, order.total_amount
            )),
        ));
    }

    if order.status != OrderStatus::Pending {
        tracing::info!(order_id = %order_id, status = %order.status, "ipn replay ignored");
        return Ok(AckCode::AlreadyConfirmed.into());
    }

    let event = match verified.outcome {
        PaymentOutcome::Succeeded => OrderEvent::PaymentSucceeded,
        PaymentOutcome::Failed => OrderEvent::PaymentFailed,
    };
    let transition = order_state::transition(OrderStatus::Pending, event)
        .map_err(|err| reject(AckCode::Unknown, err.into()))?;

    let txn = state
        .orm
        .begin()
        .await
        .map_err(|err| reject(AckCode::Unknown, err.into()))?;
    let applied = order_state::commit_transition(&txn, order_id, &transition)
        .await
        .map_err(|err| reject(AckCode::Unknown, err))?;
    if !applied {
        // Lost the race to another callback; dropping `txn` rolls back.
        tracing::info!(order_id = %order_id, "ipn settled concurrently");
        return Ok(AckCode::AlreadyConfirmed.into());
    }
    txn.commit()
        .await
        .map_err(|err| reject(AckCode::Unknown, err.into()))?;

    tracing::info!(
        order_id = %order_id,
        outcome = ?verified.outcome,
        to = %transition.to,
        "payment settled"
    );
    audit::record(
        &state.orm,
        Some(order.user_id),
        "payment_settled",
        &format!("order:{order_id}"),
        json!({
            "outcome": format!("{:?}", verified.outcome),
            "status": transition.to.as_str(),
            "response_code": verified.response_code,
            "transaction_status": verified.transaction_status,
            "bank_tran_no": verified.bank_tran_no,
            "transaction_no": verified.transaction_no,
        }),
    )
    .await;

    Ok(AckCode::Confirmed.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_serializes_with_gateway_field_names() {
        let ack: IpnAck = AckCode::InvalidAmount.into();
        let body = serde_json::to_value(&ack).unwrap();
        assert_eq!(body, json!({ "RspCode": "04", "Message": "Invalid amount" }));
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            AckCode::Confirmed,
            AckCode::OrderNotFound,
            AckCode::AlreadyConfirmed,
            AckCode::InvalidAmount,
            AckCode::InvalidSignature,
            AckCode::Unknown,
        ]
        .map(|c| c.code());
        let mut unique = codes.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }
}
