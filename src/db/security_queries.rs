use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::models::{Security, SecurityKind};

#[derive(FromRow)]
struct SecurityRow {
    id: i64,
    symbol: String,
    name: String,
    exchange: String,
    country: String,
    currency: String,
    inception_date: Option<NaiveDate>,
    kind: String,
}

impl SecurityRow {
    fn into_security(self) -> Result<Security, sqlx::Error> {
        let kind = SecurityKind::parse(&self.kind).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown security kind '{}'", self.kind).into())
        })?;
        Ok(Security {
            id: self.id,
            symbol: self.symbol,
            name: self.name,
            exchange: self.exchange,
            country: self.country,
            currency: self.currency,
            inception_date: self.inception_date,
            kind,
        })
    }
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Security>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SecurityRow>(
        "SELECT id, symbol, name, exchange, country, currency, inception_date, kind
         FROM securities
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(SecurityRow::into_security).collect()
}

pub async fn fetch_one(pool: &PgPool, id: i64) -> Result<Option<Security>, sqlx::Error> {
    let row = sqlx::query_as::<_, SecurityRow>(
        "SELECT id, symbol, name, exchange, country, currency, inception_date, kind
         FROM securities
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(SecurityRow::into_security).transpose()
}

/// All listings sharing a symbol; the caller disambiguates.
pub async fn fetch_by_symbol(pool: &PgPool, symbol: &str) -> Result<Vec<Security>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SecurityRow>(
        "SELECT id, symbol, name, exchange, country, currency, inception_date, kind
         FROM securities
         WHERE symbol = $1
         ORDER BY id",
    )
    .bind(symbol)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(SecurityRow::into_security).collect()
}
