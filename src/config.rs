use std::env;

const VNPAY_SANDBOX_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub redis_url: Option<String>,
    pub cart_cache_ttl_secs: u64,
    pub vnpay: VnpayConfig,
}

#[derive(Debug, Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub locale: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());
        let cart_cache_ttl_secs = env::var("CART_CACHE_TTL_SECS")
            .ok()
            .and_then(|ttl| ttl.parse::<u64>().ok())
            .unwrap_or(300);
        Ok(Self {
            port,
            database_url,
            host,
            redis_url,
            cart_cache_ttl_secs,
            vnpay: VnpayConfig::from_env()?,
        })
    }
}

impl VnpayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let tmn_code = env::var("VNPAY_TMN_CODE")?;
        let hash_secret = env::var("VNPAY_HASH_SECRET")?;
        let pay_url = env::var("VNPAY_PAY_URL").unwrap_or_else(|_| VNPAY_SANDBOX_URL.to_string());
        let locale = env::var("VNPAY_LOCALE").unwrap_or_else(|_| "vn".to_string());
        Ok(Self {
            tmn_code,
            hash_secret,
            pay_url,
            locale,
        })
    }
}
