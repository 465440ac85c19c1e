use bigdecimal::ToPrimitive;
use chrono::{Duration, NaiveDate, Utc};
use rand::Rng;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::db;
use crate::errors::AppError;
use crate::external::market_provider::MarketProviderError;
use crate::models::{CorporateAction, Security};
use crate::services::context::RequestContext;
use crate::services::valuation::SecuritySeries;

const MAX_RETRIES: u32 = 3;

// Days of history loaded ahead of the requested start so carry-forward has
// something to carry on the first trading day of the window.
const LOOKBACK_DAYS: i64 = 7;

/// Closes and split events for one security over a window, served from the
/// cache when the materialized range covers it, fetched and persisted
/// otherwise. A fetch failure is fatal to the caller's request: the series
/// cannot be completed.
pub async fn load_series(
    ctx: &RequestContext<'_>,
    security: &Security,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<SecuritySeries, AppError> {
    let fetch_start = start - Duration::days(LOOKBACK_DAYS);

    if !is_materialized(ctx, security.id, fetch_start, end).await? {
        let key = format!("price:{}", security.id);
        let _guard = ctx.flights.acquire(&key).await;
        // Re-check under the lock: a concurrent request may have filled the
        // range while we waited.
        if !is_materialized(ctx, security.id, fetch_start, end).await? {
            refresh_from_provider(ctx, security, fetch_start, end).await?;
        }
    }

    read_series(ctx, security.id, fetch_start, end).await
}

async fn is_materialized(
    ctx: &RequestContext<'_>,
    security_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<bool, AppError> {
    let today = Utc::now().date_naive();
    let effective_end = end.min(today);
    Ok(db::price_queries::fetch_range(ctx.pool, security_id)
        .await?
        .map(|range| {
            range.range_start <= start
                && range.range_end >= effective_end
                && (range.next_due > Utc::now() || range.range_end >= today)
        })
        .unwrap_or(false))
}

async fn refresh_from_provider(
    ctx: &RequestContext<'_>,
    security: &Security,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), AppError> {
    let mut retries = 0;
    loop {
        let _permit = ctx.limiter.acquire().await;
        info!("Fetching daily history for {} ({}..{})", security.symbol, start, end);

        match ctx.provider.fetch_daily_history(&security.symbol, start, end).await {
            Ok(bars) => {
                let points: Vec<_> = bars.iter().map(|b| (b.date, b.close.clone())).collect();
                db::price_queries::upsert_daily(ctx.pool, security.id, &points).await?;

                let events: Vec<CorporateAction> = bars
                    .iter()
                    .filter(|b| b.split_coefficient > 0.0 && b.split_coefficient != 1.0 || b.dividend > 0.0)
                    .map(|b| CorporateAction {
                        security_id: security.id,
                        date: b.date,
                        split_coefficient: b.split_coefficient,
                        dividend: b.dividend,
                    })
                    .collect();
                if !events.is_empty() {
                    db::event_queries::upsert_events(ctx.pool, &events).await?;
                }

                let next_due = Utc::now() + Duration::hours(24);
                db::price_queries::upsert_range(ctx.pool, security.id, start, end, next_due).await?;
                return Ok(());
            }
            Err(MarketProviderError::RateLimited) if retries < MAX_RETRIES => {
                retries += 1;
                let jitter = rand::rng().random_range(0..1000);
                let delay = std::time::Duration::from_millis(5_000 * retries as u64 + jitter);
                warn!(
                    "Rate limited fetching {}; retrying in {:?} (attempt {}/{})",
                    security.symbol, delay, retries, MAX_RETRIES
                );
                sleep(delay).await;
            }
            Err(MarketProviderError::RateLimited) => return Err(AppError::RateLimited),
            Err(MarketProviderError::NotFound) => {
                return Err(AppError::NotFound(format!(
                    "No price history for symbol {}",
                    security.symbol
                )))
            }
            Err(e) => return Err(AppError::External(e.to_string())),
        }
    }
}

async fn read_series(
    ctx: &RequestContext<'_>,
    security_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<SecuritySeries, AppError> {
    let points = db::price_queries::fetch_daily(ctx.pool, security_id, start, end).await?;
    let events = db::event_queries::fetch_events(ctx.pool, security_id, start, end).await?;

    let closes = points
        .into_iter()
        .filter_map(|p| p.close.to_f64().map(|close| (p.date, close)))
        .collect();
    let splits = events
        .iter()
        .filter(|e| e.is_effective_split())
        .map(|e| (e.date, e.split_coefficient))
        .collect();

    Ok(SecuritySeries { closes, splits })
}
