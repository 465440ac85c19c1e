use sqlx::PgPool;

use crate::external::market_provider::MarketDataProvider;
use crate::services::rate_limiter::RateLimiter;
use crate::services::single_flight::SingleFlight;
use crate::services::warnings::Warnings;

// Everything one compare request carries through the pipeline: the store,
// the provider, the process-wide fetch guards, and the request's warning
// channel. Passing one handle keeps the engine signatures flat.
pub struct RequestContext<'a> {
    pub pool: &'a PgPool,
    pub provider: &'a dyn MarketDataProvider,
    pub limiter: &'a RateLimiter,
    pub flights: &'a SingleFlight,
    pub warnings: Warnings,
}
