use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use tracing::error;

use crate::models::{PricePoint, PriceRange};

#[derive(FromRow)]
struct PricePointRow {
    security_id: i64,
    date: NaiveDate,
    close: BigDecimal,
}

#[derive(FromRow)]
struct PriceRangeRow {
    security_id: i64,
    range_start: NaiveDate,
    range_end: NaiveDate,
    next_due: chrono::DateTime<chrono::Utc>,
}

pub async fn fetch_daily(
    pool: &PgPool,
    security_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PricePoint>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PricePointRow>(
        "SELECT security_id, date, close
         FROM price_points
         WHERE security_id = $1 AND date BETWEEN $2 AND $3
         ORDER BY date ASC",
    )
    .bind(security_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| PricePoint {
            security_id: r.security_id,
            date: r.date,
            close: r.close,
        })
        .collect())
}

pub async fn fetch_range(pool: &PgPool, security_id: i64) -> Result<Option<PriceRange>, sqlx::Error> {
    let row = sqlx::query_as::<_, PriceRangeRow>(
        "SELECT security_id, range_start, range_end, next_due
         FROM price_ranges
         WHERE security_id = $1",
    )
    .bind(security_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| PriceRange {
        security_id: r.security_id,
        range_start: r.range_start,
        range_end: r.range_end,
        next_due: r.next_due,
    }))
}

pub async fn upsert_daily(
    pool: &PgPool,
    security_id: i64,
    points: &[(NaiveDate, BigDecimal)],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for (date, close) in points {
        if let Err(e) = sqlx::query(
            "INSERT INTO price_points (security_id, date, close)
             VALUES ($1, $2, $3)
             ON CONFLICT (security_id, date)
             DO UPDATE SET close = EXCLUDED.close",
        )
        .bind(security_id)
        .bind(date)
        .bind(close)
        .execute(&mut *tx)
        .await
        {
            error!("Failed to upsert close for security {} on {}: {}", security_id, date, e);
            return Err(e);
        }
    }

    tx.commit().await?;
    Ok(())
}

// Widen the materialized range to cover the newly fetched span and push the
// refresh stamp forward.
pub async fn upsert_range(
    pool: &PgPool,
    security_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    next_due: chrono::DateTime<chrono::Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO price_ranges (security_id, range_start, range_end, next_due)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (security_id)
         DO UPDATE SET range_start = LEAST(price_ranges.range_start, EXCLUDED.range_start),
                       range_end = GREATEST(price_ranges.range_end, EXCLUDED.range_end),
                       next_due = EXCLUDED.next_due",
    )
    .bind(security_id)
    .bind(start)
    .bind(end)
    .bind(next_due)
    .execute(pool)
    .await?;
    Ok(())
}
