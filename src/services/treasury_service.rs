use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use tracing::info;

use crate::db;
use crate::errors::AppError;
use crate::external::market_provider::MarketProviderError;
use crate::models::YieldPoint;
use crate::services::context::RequestContext;

// Yields are published on business days only; coverage within this many
// days of a window edge counts as complete.
const PUBLICATION_SLACK_DAYS: i64 = 5;

/// The 10-year treasury series over a window, dense across calendar days.
/// Missing days (weekends, holidays) average the nearest prior and next
/// published values.
pub async fn yield_series(
    ctx: &RequestContext<'_>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BTreeMap<NaiveDate, f64>, AppError> {
    let mut points = db::treasury_queries::fetch_yields(ctx.pool, start, end).await?;

    if !covers_window(&points, start, end) {
        let _guard = ctx.flights.acquire("treasury").await;
        points = db::treasury_queries::fetch_yields(ctx.pool, start, end).await?;
        if !covers_window(&points, start, end) {
            info!("Fetching treasury yields for {}..{}", start, end);
            let _permit = ctx.limiter.acquire().await;
            let fetched = ctx
                .provider
                .fetch_treasury_yields(start, end)
                .await
                .map_err(|e| match e {
                    MarketProviderError::RateLimited => AppError::RateLimited,
                    other => AppError::External(other.to_string()),
                })?;
            let fetched: Vec<YieldPoint> = fetched
                .into_iter()
                .map(|p| YieldPoint { date: p.date, rate: p.rate })
                .collect();
            db::treasury_queries::upsert_yields(ctx.pool, &fetched).await?;
            points = fetched;
        }
    }

    Ok(fill_calendar_gaps(&points, start, end))
}

fn covers_window(points: &[YieldPoint], start: NaiveDate, end: NaiveDate) -> bool {
    let today = Utc::now().date_naive();
    let effective_end = end.min(today);
    let slack = Duration::days(PUBLICATION_SLACK_DAYS);
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => {
            first.date <= start + slack && last.date + slack >= effective_end
        }
        _ => false,
    }
}

// Dense calendar map from sparse published points: a gap day takes the
// average of the nearest prior and next published values, or whichever
// side exists at the window edges.
pub fn fill_calendar_gaps(
    points: &[YieldPoint],
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeMap<NaiveDate, f64> {
    let published: BTreeMap<NaiveDate, f64> = points.iter().map(|p| (p.date, p.rate)).collect();
    let mut filled = BTreeMap::new();
    if published.is_empty() {
        return filled;
    }

    let mut day = start;
    while day <= end {
        let value = match published.get(&day) {
            Some(&rate) => Some(rate),
            None => {
                let prior = published.range(..day).next_back().map(|(_, &r)| r);
                let next = published.range(day..).next().map(|(_, &r)| r);
                match (prior, next) {
                    (Some(p), Some(n)) => Some((p + n) / 2.0),
                    (Some(p), None) => Some(p),
                    (None, Some(n)) => Some(n),
                    (None, None) => None,
                }
            }
        };
        if let Some(value) = value {
            filled.insert(day, value);
        }
        day = day + Duration::days(1);
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn point(s: &str, rate: f64) -> YieldPoint {
        YieldPoint { date: date(s), rate }
    }

    #[test]
    fn weekend_gaps_average_the_neighbors() {
        // Friday 4.0, Monday 4.4; the weekend reads 4.2.
        let points = vec![point("2025-01-10", 4.0), point("2025-01-13", 4.4)];
        let filled = fill_calendar_gaps(&points, date("2025-01-10"), date("2025-01-13"));

        assert_eq!(filled[&date("2025-01-10")], 4.0);
        assert!((filled[&date("2025-01-11")] - 4.2).abs() < 1e-12);
        assert!((filled[&date("2025-01-12")] - 4.2).abs() < 1e-12);
        assert_eq!(filled[&date("2025-01-13")], 4.4);
    }

    #[test]
    fn edges_without_a_neighbor_use_the_available_side() {
        let points = vec![point("2025-01-08", 4.1)];
        let filled = fill_calendar_gaps(&points, date("2025-01-06"), date("2025-01-10"));

        assert_eq!(filled[&date("2025-01-06")], 4.1);
        assert_eq!(filled[&date("2025-01-10")], 4.1);
        assert_eq!(filled.len(), 5);
    }

    #[test]
    fn empty_series_fills_nothing() {
        assert!(fill_calendar_gaps(&[], date("2025-01-06"), date("2025-01-10")).is_empty());
    }
}
