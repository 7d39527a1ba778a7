use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use super::{GatewayError, IpnFields, PaymentGateway, PaymentOutcome, VerifiedIpn};
use crate::{config::VnpayConfig, models::Order};

type HmacSha512 = Hmac<Sha512>;

const VERSION: &str = "2.1.0";
const SUCCESS_CODE: &str = "00";
const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
const PAYMENT_WINDOW_MINUTES: i64 = 15;
// VNPay wants timestamps in Vietnam local time.
const VN_OFFSET_SECS: i32 = 7 * 3600;

#[derive(Debug, Clone)]
pub struct VnpayGateway {
    config: VnpayConfig,
    ip_addr: String,
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        Self {
            config,
            ip_addr: "127.0.0.1".to_string(),
        }
    }

    pub fn with_ip_addr(mut self, ip_addr: impl Into<String>) -> Self {
        self.ip_addr = ip_addr.into();
        self
    }

    /// Signature the gateway expects over the signed subset of `fields`.
    pub fn signature(&self, fields: &IpnFields) -> Result<String, GatewayError> {
        self.hmac_hex(&signing_data(fields)?)
    }

    fn hmac_hex(&self, data: &str) -> Result<String, GatewayError> {
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .map_err(|err| GatewayError::Config(err.to_string()))?;
        mac.update(data.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn check_signature(&self, data: &str, provided: &str) -> Result<(), GatewayError> {
        let provided = hex::decode(provided).map_err(|_| GatewayError::InvalidSignature)?;
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .map_err(|err| GatewayError::Config(err.to_string()))?;
        mac.update(data.as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| GatewayError::InvalidSignature)
    }

    pub fn build_payment_url(&self, order: &Order, now: DateTime<Utc>) -> Result<String, GatewayError> {
        let offset = FixedOffset::east_opt(VN_OFFSET_SECS)
            .ok_or_else(|| GatewayError::Config("invalid VN offset".into()))?;
        let created = now.with_timezone(&offset);
        let expires = created + Duration::minutes(PAYMENT_WINDOW_MINUTES);
        let amount = order
            .total_amount
            .checked_mul(100)
            .ok_or_else(|| GatewayError::Request("amount out of range".into()))?;

        let mut params = IpnFields::new();
        params.insert("vnp_Version".into(), VERSION.into());
        params.insert("vnp_Command".into(), "pay".into());
        params.insert("vnp_TmnCode".into(), self.config.tmn_code.clone());
        params.insert("vnp_Amount".into(), amount.to_string());
        params.insert("vnp_CurrCode".into(), "VND".into());
        params.insert("vnp_TxnRef".into(), order.id.to_string());
        params.insert("vnp_OrderInfo".into(), format!("Thanh toan don hang {}", order.id));
        params.insert("vnp_OrderType".into(), "other".into());
        params.insert("vnp_Locale".into(), self.config.locale.clone());
        params.insert("vnp_ReturnUrl".into(), order.return_url.clone());
        params.insert("vnp_IpAddr".into(), self.ip_addr.clone());
        params.insert("vnp_CreateDate".into(), created.format("%Y%m%d%H%M%S").to_string());
        params.insert("vnp_ExpireDate".into(), expires.format("%Y%m%d%H%M%S").to_string());

        let query = signing_data(&params)?;
        let hash = self.hmac_hex(&query)?;
        Ok(format!("{}?{}&{}={}", self.config.pay_url, query, SECURE_HASH, hash))
    }
}

/// Form-encoded `vnp_*` fields in key order, minus the hash fields. This is
/// the byte string both sides sign.
fn signing_data(fields: &IpnFields) -> Result<String, GatewayError> {
    let signed: Vec<(&str, &str)> = fields
        .iter()
        .filter(|(key, value)| {
            key.starts_with("vnp_")
                && key.as_str() != SECURE_HASH
                && key.as_str() != SECURE_HASH_TYPE
                && !value.is_empty()
        })
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    serde_urlencoded::to_string(signed).map_err(|err| GatewayError::Request(err.to_string()))
}

fn field(fields: &IpnFields, name: &str) -> String {
    fields.get(name).cloned().unwrap_or_default()
}

/// Only the exact success sentinels count as paid.
pub fn outcome_of(response_code: &str, transaction_status: &str) -> PaymentOutcome {
    if response_code == SUCCESS_CODE && transaction_status == SUCCESS_CODE {
        PaymentOutcome::Succeeded
    } else {
        PaymentOutcome::Failed
    }
}

#[async_trait]
impl PaymentGateway for VnpayGateway {
    async fn payment_url(&self, order: &Order) -> Result<String, GatewayError> {
        self.build_payment_url(order, Utc::now())
    }

    async fn verify_ipn(&self, fields: &IpnFields) -> Result<VerifiedIpn, GatewayError> {
        let provided = fields
            .get(SECURE_HASH)
            .filter(|hash| !hash.is_empty())
            .ok_or(GatewayError::InvalidSignature)?;
        self.check_signature(&signing_data(fields)?, provided)?;

        let response_code = field(fields, "vnp_ResponseCode");
        let transaction_status = field(fields, "vnp_TransactionStatus");
        // vnp_Amount carries two implied decimals.
        let amount = fields
            .get("vnp_Amount")
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|raw| raw % 100 == 0)
            .map(|raw| raw / 100);

        Ok(VerifiedIpn {
            txn_ref: field(fields, "vnp_TxnRef"),
            amount,
            outcome: outcome_of(&response_code, &transaction_status),
            response_code,
            transaction_status,
            bank_tran_no: fields.get("vnp_BankTranNo").cloned(),
            transaction_no: fields.get("vnp_TransactionNo").cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;
    use crate::models::{OrderStatus, PaymentProvider};

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(VnpayConfig {
            tmn_code: "DEMO0001".into(),
            hash_secret: "SECRETKEY".into(),
            pay_url: "https://pay.example/vpcpay.html".into(),
            locale: "vn".into(),
        })
    }

    fn order(total_amount: i64) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            recipient_name: "Nguyen Van A".into(),
            phone: "+84912345678".into(),
            address: "1 Le Loi, District 1".into(),
            payment_provider: PaymentProvider::Vnpay,
            total_amount,
            is_paid: false,
            status: OrderStatus::Pending,
            return_url: "https://shop.example/return?x=1 2".into(),
            payment_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fields the gateway would send back for `order`, signed with `gw`'s key.
    fn signed_callback(gw: &VnpayGateway, order: &Order, response: &str, status: &str) -> IpnFields {
        let mut fields = IpnFields::new();
        fields.insert("vnp_TmnCode".into(), "DEMO0001".into());
        fields.insert("vnp_Amount".into(), (order.total_amount * 100).to_string());
        fields.insert("vnp_BankCode".into(), "NCB".into());
        fields.insert("vnp_BankTranNo".into(), "VNP14226112".into());
        fields.insert("vnp_OrderInfo".into(), "Thanh toan don hang".into());
        fields.insert("vnp_TransactionNo".into(), "14226112".into());
        fields.insert("vnp_ResponseCode".into(), response.into());
        fields.insert("vnp_TransactionStatus".into(), status.into());
        fields.insert("vnp_TxnRef".into(), order.id.to_string());
        let hash = gw.signature(&fields).unwrap();
        fields.insert(SECURE_HASH.into(), hash);
        fields.insert(SECURE_HASH_TYPE.into(), "HmacSHA512".into());
        fields
    }

    #[test]
    fn payment_url_is_signed_over_sorted_fields() {
        let gw = gateway();
        let order = order(500_000);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();

        let url = gw.build_payment_url(&order, now).unwrap();
        let (base, query) = url.split_once('?').unwrap();
        assert_eq!(base, "https://pay.example/vpcpay.html");

        let (signed, hash) = query.rsplit_once("&vnp_SecureHash=").unwrap();
        assert_eq!(gw.hmac_hex(signed).unwrap(), hash);
        assert!(signed.contains("vnp_Amount=50000000"));
        assert!(signed.contains(&format!("vnp_TxnRef={}", order.id)));
        assert!(signed.contains("vnp_CreateDate=20250101100000"));
        assert!(signed.contains("vnp_ExpireDate=20250101101500"));

        let fields: IpnFields = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(fields["vnp_ReturnUrl"], order.return_url);
    }

    #[tokio::test]
    async fn verifies_success_callback() {
        let gw = gateway();
        let order = order(250_000);
        let fields = signed_callback(&gw, &order, "00", "00");

        let verified = gw.verify_ipn(&fields).await.unwrap();
        assert_eq!(verified.outcome, PaymentOutcome::Succeeded);
        assert_eq!(verified.amount, Some(250_000));
        assert_eq!(verified.txn_ref, order.id.to_string());
        assert_eq!(verified.bank_tran_no.as_deref(), Some("VNP14226112"));
    }

    #[tokio::test]
    async fn anything_but_both_sentinels_is_a_failure() {
        let gw = gateway();
        let order = order(1_000);
        for (response, status) in [("24", "02"), ("00", "02"), ("24", "00"), ("", "")] {
            let verified = gw
                .verify_ipn(&signed_callback(&gw, &order, response, status))
                .await
                .unwrap();
            assert_eq!(verified.outcome, PaymentOutcome::Failed, "{response}/{status}");
        }
    }

    #[tokio::test]
    async fn tampered_or_unsigned_callbacks_are_rejected() {
        let gw = gateway();
        let order = order(1_000);

        let mut tampered = signed_callback(&gw, &order, "00", "00");
        tampered.insert("vnp_Amount".into(), "100".into());
        assert!(matches!(
            gw.verify_ipn(&tampered).await,
            Err(GatewayError::InvalidSignature)
        ));

        let mut unsigned = signed_callback(&gw, &order, "00", "00");
        unsigned.remove(SECURE_HASH);
        assert!(matches!(
            gw.verify_ipn(&unsigned).await,
            Err(GatewayError::InvalidSignature)
        ));

        let mut garbage = signed_callback(&gw, &order, "00", "00");
        garbage.insert(SECURE_HASH.into(), "not-hex".into());
        assert!(matches!(
            gw.verify_ipn(&garbage).await,
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn other_merchant_key_does_not_verify() {
        let order = order(1_000);
        let fields = signed_callback(&gateway(), &order, "00", "00");
        let other = VnpayGateway::new(VnpayConfig {
            hash_secret: "OTHERKEY".into(),
            ..gateway().config
        });
        assert!(other.verify_ipn(&fields).await.is_err());
    }
}
