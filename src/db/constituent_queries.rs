use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::models::{ConstituentSet, FundConstituent};

#[derive(FromRow)]
struct ConstituentRow {
    security_id: i64,
    symbol: String,
    weight: f64,
}

#[derive(FromRow)]
struct PullRow {
    pulled_at: NaiveDate,
    next_due: NaiveDate,
}

/// The cached resolved constituents of a fund, if a pull has happened.
pub async fn fetch_resolved(pool: &PgPool, fund_id: i64) -> Result<Option<ConstituentSet>, sqlx::Error> {
    let pull = sqlx::query_as::<_, PullRow>(
        "SELECT pulled_at, next_due
         FROM fund_constituent_pulls
         WHERE fund_id = $1",
    )
    .bind(fund_id)
    .fetch_optional(pool)
    .await?;
    let Some(pull) = pull else {
        return Ok(None);
    };

    let rows = sqlx::query_as::<_, ConstituentRow>(
        "SELECT security_id, symbol, weight
         FROM fund_constituents
         WHERE fund_id = $1
         ORDER BY position",
    )
    .bind(fund_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(ConstituentSet {
        fund_id,
        constituents: rows
            .into_iter()
            .map(|r| FundConstituent {
                security_id: r.security_id,
                symbol: r.symbol,
                weight: r.weight,
            })
            .collect(),
        pulled_at: pull.pulled_at,
        next_due: pull.next_due,
    }))
}

// Replace the fund's constituent rows and freshness record atomically, so
// a concurrent reader never sees a half-written set.
pub async fn upsert_resolved(
    pool: &PgPool,
    fund_id: i64,
    constituents: &[FundConstituent],
    pulled_at: NaiveDate,
    next_due: NaiveDate,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM fund_constituents WHERE fund_id = $1")
        .bind(fund_id)
        .execute(&mut *tx)
        .await?;

    for (position, constituent) in constituents.iter().enumerate() {
        sqlx::query(
            "INSERT INTO fund_constituents (fund_id, security_id, symbol, weight, position)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(fund_id)
        .bind(constituent.security_id)
        .bind(&constituent.symbol)
        .bind(constituent.weight)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "INSERT INTO fund_constituent_pulls (fund_id, pulled_at, next_due)
         VALUES ($1, $2, $3)
         ON CONFLICT (fund_id)
         DO UPDATE SET pulled_at = EXCLUDED.pulled_at, next_due = EXCLUDED.next_due",
    )
    .bind(fund_id)
    .bind(pulled_at)
    .bind(next_due)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
