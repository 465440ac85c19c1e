use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::{
    CreateMembership, CreatePortfolio, Portfolio, PortfolioKind, RawConstituent,
};
use crate::services::portfolio_service;

#[derive(Debug, Deserialize)]
struct PortfolioCsvRow {
    symbol: String,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    shares: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConstituentCsvRow {
    #[serde(default)]
    symbol: String,
    name: String,
    weight: f64,
}

fn parse_portfolio_rows(content: &str) -> Result<Vec<PortfolioCsvRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (line, row) in reader.deserialize::<PortfolioCsvRow>().enumerate() {
        let row = row.with_context(|| format!("Line {}: malformed portfolio row", line + 2))?;
        if row.symbol.is_empty() {
            anyhow::bail!("Line {}: missing symbol", line + 2);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Create a portfolio from a `symbol,weight,shares` CSV.
pub async fn import_portfolio(
    pool: &PgPool,
    name: &str,
    owner: &str,
    kind: PortfolioKind,
    content: &str,
) -> Result<Portfolio, AppError> {
    let rows = parse_portfolio_rows(content).map_err(|e| AppError::Validation(e.to_string()))?;

    let memberships = rows
        .into_iter()
        .map(|row| CreateMembership {
            security_id: None,
            ticker: Some(row.symbol),
            weight: row.weight,
            shares: row.shares,
        })
        .collect();

    portfolio_service::create(
        pool,
        CreatePortfolio {
            name: name.to_string(),
            owner: owner.to_string(),
            kind,
            objective: None,
            memberships,
        },
    )
    .await
}

/// Parse a raw fund constituent file (`symbol,name,weight`). Placeholder
/// lines keep their empty symbols; the resolver deals with them.
pub fn parse_constituents(content: &str) -> Result<Vec<RawConstituent>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (line, row) in reader.deserialize::<ConstituentCsvRow>().enumerate() {
        let row = row
            .with_context(|| format!("Line {}: malformed constituent row", line + 2))
            .map_err(|e| AppError::Validation(e.to_string()))?;
        rows.push(RawConstituent {
            symbol: row.symbol,
            name: row.name,
            weight: row.weight,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portfolio_rows_parse_weights_and_shares() {
        let csv = "symbol,weight,shares\nAAPL,0.6,\nMSFT,0.4,\n";
        let rows = parse_portfolio_rows(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "AAPL");
        assert_eq!(rows[0].weight, Some(0.6));
        assert_eq!(rows[0].shares, None);
    }

    #[test]
    fn missing_symbol_is_rejected() {
        let csv = "symbol,weight,shares\n,0.6,\n";
        assert!(parse_portfolio_rows(csv).is_err());
    }

    #[test]
    fn constituent_rows_keep_placeholders_and_negative_weights() {
        let csv = "symbol,name,weight\nNVDA,NVIDIA CORP,0.05\n,NVIDIA CORP SWAP,0.09\n,CASH OFFSET,-0.20\n";
        let rows = parse_constituents(csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].symbol, "");
        assert_eq!(rows[2].weight, -0.20);
    }
}
