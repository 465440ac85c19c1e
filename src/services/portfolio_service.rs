use std::collections::HashSet;

use sqlx::PgPool;

use crate::db;
use crate::errors::AppError;
use crate::models::{CreateMembership, CreatePortfolio, Portfolio, PortfolioKind};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub async fn create(pool: &PgPool, input: CreatePortfolio) -> Result<Portfolio, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Portfolio name cannot be empty".into()));
    }

    let mut rows: Vec<(i64, Option<f64>, Option<f64>)> = Vec::with_capacity(input.memberships.len());
    let mut seen: HashSet<i64> = HashSet::new();
    let mut weight_sum = 0.0;

    for membership in &input.memberships {
        let security_id = resolve_security_id(pool, membership).await?;
        if !seen.insert(security_id) {
            return Err(AppError::Validation(format!(
                "Security {} appears more than once",
                security_id
            )));
        }

        match input.kind {
            PortfolioKind::Ideal => {
                if membership.shares.is_some() {
                    return Err(AppError::Validation(
                        "An ideal portfolio carries weights, not share counts".into(),
                    ));
                }
                let weight = membership.weight.ok_or_else(|| {
                    AppError::Validation("Each ideal membership needs a weight".into())
                })?;
                if !(0.0..=1.0).contains(&weight) {
                    return Err(AppError::Validation(format!(
                        "Weight {} is outside [0, 1]",
                        weight
                    )));
                }
                weight_sum += weight;
                rows.push((security_id, Some(weight), None));
            }
            PortfolioKind::Active => {
                if membership.weight.is_some() {
                    return Err(AppError::Validation(
                        "An active portfolio carries share counts, not weights".into(),
                    ));
                }
                let shares = membership.shares.ok_or_else(|| {
                    AppError::Validation("Each active membership needs a share count".into())
                })?;
                if shares < 0.0 {
                    return Err(AppError::Validation(format!(
                        "Share count {} is negative",
                        shares
                    )));
                }
                rows.push((security_id, None, Some(shares)));
            }
        }
    }

    if input.kind == PortfolioKind::Ideal && weight_sum > 1.0 + WEIGHT_SUM_TOLERANCE {
        return Err(AppError::Validation(format!(
            "Ideal weights sum to {:.4}, above 1",
            weight_sum
        )));
    }

    let portfolio = db::portfolio_queries::insert(
        pool,
        input.name.trim(),
        &input.owner,
        input.kind,
        input.objective.as_deref(),
        &rows,
    )
    .await?;
    Ok(portfolio)
}

// Exactly one of security_id / ticker must identify the security.
async fn resolve_security_id(pool: &PgPool, membership: &CreateMembership) -> Result<i64, AppError> {
    match (membership.security_id, membership.ticker.as_deref()) {
        (Some(_), Some(_)) => Err(AppError::Validation(
            "Set either security_id or ticker, not both".into(),
        )),
        (None, None) => Err(AppError::Validation(
            "Each membership needs a security_id or a ticker".into(),
        )),
        (Some(id), None) => {
            db::security_queries::fetch_one(pool, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Security {} not found", id)))?;
            Ok(id)
        }
        (None, Some(ticker)) => {
            let candidates = db::security_queries::fetch_by_symbol(pool, ticker).await?;
            match candidates.len() {
                0 => Err(AppError::NotFound(format!("Ticker {} not found", ticker))),
                1 => Ok(candidates[0].id),
                _ => Err(AppError::Validation(format!(
                    "Ticker {} is ambiguous across {} listings; use security_id",
                    ticker,
                    candidates.len()
                ))),
            }
        }
    }
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Portfolio>, AppError> {
    Ok(db::portfolio_queries::fetch_all(pool).await?)
}

pub async fn fetch_one(pool: &PgPool, id: i64) -> Result<Portfolio, AppError> {
    db::portfolio_queries::fetch_one(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Portfolio {} not found", id)))
}
