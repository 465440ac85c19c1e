use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::models::CorporateAction;

#[derive(FromRow)]
struct CorporateActionRow {
    security_id: i64,
    date: NaiveDate,
    split_coefficient: f64,
    dividend: f64,
}

pub async fn fetch_events(
    pool: &PgPool,
    security_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<CorporateAction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CorporateActionRow>(
        "SELECT security_id, date, split_coefficient, dividend
         FROM corporate_actions
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
        .map(|r| CorporateAction {
            security_id: r.security_id,
            date: r.date,
            split_coefficient: r.split_coefficient,
            dividend: r.dividend,
        })
        .collect())
}

pub async fn upsert_events(pool: &PgPool, events: &[CorporateAction]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for event in events {
        sqlx::query(
            "INSERT INTO corporate_actions (security_id, date, split_coefficient, dividend)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (security_id, date)
             DO UPDATE SET split_coefficient = EXCLUDED.split_coefficient,
                           dividend = EXCLUDED.dividend",
        )
        .bind(event.security_id)
        .bind(event.date)
        .bind(event.split_coefficient)
        .bind(event.dividend)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
