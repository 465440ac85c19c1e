use chrono::{Duration, Utc};
use tracing::info;

use crate::db;
use crate::errors::AppError;
use crate::external::market_provider::MarketProviderError;
use crate::models::{FundConstituent, RawConstituent, Security, SecurityUniverse};
use crate::services::context::RequestContext;
use crate::services::resolver;

/// How long a resolved constituent set stays fresh before the next pull.
pub const PULL_INTERVAL_DAYS: i64 = 30;

// Resolved constituents of a fund, from cache when fresh. The resolver's
// warnings are emitted only on the fresh-resolve path, which runs under the
// per-fund single-flight lock; every later read within the request sees a
// cached set that already sums to 1 and stays silent.
pub async fn get_resolved(
    ctx: &RequestContext<'_>,
    fund: &Security,
    universe: &SecurityUniverse,
) -> Result<Vec<FundConstituent>, AppError> {
    let today = Utc::now().date_naive();

    if let Some(cached) = db::constituent_queries::fetch_resolved(ctx.pool, fund.id).await? {
        if cached.next_due > today {
            return Ok(cached.constituents);
        }
    }

    let key = format!("fund:{}", fund.id);
    let _guard = ctx.flights.acquire(&key).await;
    if let Some(cached) = db::constituent_queries::fetch_resolved(ctx.pool, fund.id).await? {
        if cached.next_due > today {
            return Ok(cached.constituents);
        }
    }

    info!("Pulling fund holdings for {}", fund.symbol);
    let _permit = ctx.limiter.acquire().await;
    let raw = ctx
        .provider
        .fetch_fund_holdings(&fund.symbol)
        .await
        .map_err(|e| match e {
            MarketProviderError::RateLimited => AppError::RateLimited,
            MarketProviderError::NotFound => {
                AppError::NotFound(format!("No holdings data for fund {}", fund.symbol))
            }
            other => AppError::External(other.to_string()),
        })?;

    let raw: Vec<RawConstituent> = raw
        .into_iter()
        .map(|h| RawConstituent {
            symbol: h.symbol,
            name: h.name,
            weight: h.weight,
        })
        .collect();

    let resolved = resolver::resolve_constituents(
        &fund.symbol,
        &fund.name,
        &fund.currency,
        raw,
        universe,
        &ctx.warnings,
    );
    if resolved.is_empty() {
        return Err(AppError::DataIntegrity(format!(
            "Fund {} resolved to an empty constituent set",
            fund.symbol
        )));
    }

    db::constituent_queries::upsert_resolved(
        ctx.pool,
        fund.id,
        &resolved,
        today,
        today + Duration::days(PULL_INTERVAL_DAYS),
    )
    .await?;

    Ok(resolved)
}
