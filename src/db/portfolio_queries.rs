use sqlx::{FromRow, PgPool};

use crate::models::{Membership, Portfolio, PortfolioKind};

#[derive(FromRow)]
struct PortfolioRow {
    id: i64,
    name: String,
    owner: String,
    kind: String,
    objective: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl PortfolioRow {
    fn into_portfolio(self) -> Result<Portfolio, sqlx::Error> {
        let kind = PortfolioKind::parse(&self.kind).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown portfolio kind '{}'", self.kind).into())
        })?;
        Ok(Portfolio {
            id: self.id,
            name: self.name,
            owner: self.owner,
            kind,
            objective: self.objective,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MembershipRow {
    portfolio_id: i64,
    security_id: i64,
    weight: Option<f64>,
    shares: Option<f64>,
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Portfolio>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PortfolioRow>(
        "SELECT id, name, owner, kind, objective, created_at, updated_at
         FROM portfolios
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(PortfolioRow::into_portfolio).collect()
}

pub async fn fetch_one(pool: &PgPool, id: i64) -> Result<Option<Portfolio>, sqlx::Error> {
    let row = sqlx::query_as::<_, PortfolioRow>(
        "SELECT id, name, owner, kind, objective, created_at, updated_at
         FROM portfolios
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(PortfolioRow::into_portfolio).transpose()
}

/// Memberships in declared order; the basket round-robin depends on it.
pub async fn fetch_memberships(pool: &PgPool, portfolio_id: i64) -> Result<Vec<Membership>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MembershipRow>(
        "SELECT portfolio_id, security_id, weight, shares
         FROM portfolio_memberships
         WHERE portfolio_id = $1
         ORDER BY position",
    )
    .bind(portfolio_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| Membership {
            portfolio_id: r.portfolio_id,
            security_id: r.security_id,
            weight: r.weight,
            shares: r.shares,
        })
        .collect())
}

pub async fn insert(
    pool: &PgPool,
    name: &str,
    owner: &str,
    kind: PortfolioKind,
    objective: Option<&str>,
    memberships: &[(i64, Option<f64>, Option<f64>)],
) -> Result<Portfolio, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, PortfolioRow>(
        "INSERT INTO portfolios (name, owner, kind, objective)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, owner, kind, objective, created_at, updated_at",
    )
    .bind(name)
    .bind(owner)
    .bind(kind.as_str())
    .bind(objective)
    .fetch_one(&mut *tx)
    .await?;

    for (position, (security_id, weight, shares)) in memberships.iter().enumerate() {
        sqlx::query(
            "INSERT INTO portfolio_memberships (portfolio_id, security_id, position, weight, shares)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(row.id)
        .bind(security_id)
        .bind(position as i32)
        .bind(weight)
        .bind(shares)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    row.into_portfolio()
}
