use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::models::YieldPoint;

#[derive(FromRow)]
struct YieldRow {
    date: NaiveDate,
    rate: f64,
}

pub async fn fetch_yields(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<YieldPoint>, sqlx::Error> {
    let rows = sqlx::query_as::<_, YieldRow>(
        "SELECT date, rate
         FROM treasury_yields
         WHERE date BETWEEN $1 AND $2
         ORDER BY date ASC",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| YieldPoint { date: r.date, rate: r.rate }).collect())
}

pub async fn upsert_yields(pool: &PgPool, points: &[YieldPoint]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for point in points {
        sqlx::query(
            "INSERT INTO treasury_yields (date, rate)
             VALUES ($1, $2)
             ON CONFLICT (date) DO UPDATE SET rate = EXCLUDED.rate",
        )
        .bind(point.date)
        .bind(point.rate)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
