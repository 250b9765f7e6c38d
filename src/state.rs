use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    payment::{PayPalGateway, PaymentError, PaymentGateway},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Wire the production collaborators around an existing pool.
    pub fn new(pool: DbPool, config: AppConfig) -> Result<Self, PaymentError> {
        let gateway = PayPalGateway::new(&config.payment)?;
        Ok(Self::with_gateway(pool, config, Arc::new(gateway)))
    }

    pub fn with_gateway(
        pool: DbPool,
        config: AppConfig,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let orm = orm_from_pool(&pool);
        Self {
            pool,
            orm,
            config: Arc::new(config),
            payments,
        }
    }
}
