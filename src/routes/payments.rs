use axum::{
    Json, Router,
    extract::{RawQuery, State},
    routing::get,
};

use crate::{
    services::{
        ipn_service::{self, IpnAck},
        payment::IpnFields,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/vnpay/ipn", get(vnpay_ipn))
}

/// Gateway callback. Always 200 with the outcome in `RspCode`; the gateway
/// retries on any other status.
#[utoipa::path(
    get,
    path = "/api/payments/vnpay/ipn",
    params(("vnp_TxnRef" = String, Query, description = "Order id; every vnp_* field is signed")),
    responses(
        (status = 200, description = "Acknowledgement for the gateway", body = IpnAck)
    ),
    tag = "Payments"
)]
pub async fn vnpay_ipn(State(state): State<AppState>, RawQuery(query): RawQuery) -> Json<IpnAck> {
    // An undecodable query is treated as an unsigned callback, not a 400.
    let fields: IpnFields = serde_urlencoded::from_str(query.as_deref().unwrap_or_default())
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "undecodable ipn query");
            IpnFields::new()
        });
    match ipn_service::verify_ipn(&state, &fields).await {
        Ok(ack) => Json(ack),
        Err(rejection) => Json(rejection.ack),
    }
}
