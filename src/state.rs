use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;

use crate::{cache::Cache, services::payment::PaymentGateway};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub cache: Arc<dyn Cache>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub cart_cache_ttl: Duration,
}

impl AppState {
    pub fn new(
        orm: DatabaseConnection,
        cache: Arc<dyn Cache>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orm,
            cache,
            gateway,
            cart_cache_ttl: Duration::from_secs(300),
        }
    }

    pub fn with_cart_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cart_cache_ttl = ttl;
        self
    }
}
