//! Payment gateways: redirect URLs and callback authentication.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::models::Order;

pub mod vnpay;

pub use vnpay::VnpayGateway;

/// Raw callback fields, names and values exactly as the gateway sent them.
pub type IpnFields = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

/// A callback whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIpn {
    /// Our order id as the gateway echoed it back; not parsed yet.
    pub txn_ref: String,
    /// Paid amount in order currency units, `None` when unreadable.
    pub amount: Option<i64>,
    pub response_code: String,
    pub transaction_status: String,
    pub bank_tran_no: Option<String>,
    pub transaction_no: Option<String>,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("gateway misconfigured: {0}")]
    Config(String),

    #[error("cannot build payment request: {0}")]
    Request(String),
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Redirect URL for the buyer; the order id is the transaction reference.
    async fn payment_url(&self, order: &Order) -> Result<String, GatewayError>;

    /// Authenticate a callback and classify its outcome.
    async fn verify_ipn(&self, fields: &IpnFields) -> Result<VerifiedIpn, GatewayError>;
}
