use std::sync::Arc;

use sqlx::PgPool;

use crate::external::market_provider::MarketDataProvider;
use crate::services::rate_limiter::RateLimiter;
use crate::services::single_flight::SingleFlight;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub provider: Arc<dyn MarketDataProvider>,
    pub limiter: Arc<RateLimiter>,
    pub flights: Arc<SingleFlight>,
}

impl AppState {
    pub fn new(pool: PgPool, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            pool,
            provider,
            // Alpha Vantage free tier: keep well inside 5 requests/minute.
            limiter: Arc::new(RateLimiter::new(3, 5)),
            flights: Arc::new(SingleFlight::new()),
        }
    }
}
