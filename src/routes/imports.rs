use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db;
use crate::errors::AppError;
use crate::models::{Portfolio, PortfolioKind, SecurityUniverse};
use crate::services::constituent_service::PULL_INTERVAL_DAYS;
use crate::services::warnings::{Warning, Warnings};
use crate::services::{csv_import_service, resolver};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/imports/portfolio", post(import_portfolio))
        .route("/imports/constituents/:fund_id", post(import_constituents))
}

#[derive(Debug, Deserialize)]
pub struct PortfolioImport {
    pub name: String,
    pub owner: String,
    pub kind: PortfolioKind,
    pub csv: String,
}

#[derive(Debug, Deserialize)]
pub struct ConstituentImport {
    pub csv: String,
}

#[derive(Debug, Serialize)]
pub struct ConstituentImportResult {
    pub imported: usize,
    pub warnings: Vec<Warning>,
}

pub async fn import_portfolio(
    State(state): State<AppState>,
    Json(data): Json<PortfolioImport>,
) -> Result<Json<Portfolio>, AppError> {
    info!("POST /imports/portfolio - Importing '{}'", data.name);
    let portfolio =
        csv_import_service::import_portfolio(&state.pool, &data.name, &data.owner, data.kind, &data.csv)
            .await
            .map_err(|e| {
                error!("Failed to import portfolio '{}': {}", data.name, e);
                e
            })?;
    Ok(Json(portfolio))
}

// Intake for a raw constituent file: resolve it against the known universe
// and persist the cleaned set with a fresh pull stamp.
pub async fn import_constituents(
    State(state): State<AppState>,
    Path(fund_id): Path<i64>,
    Json(data): Json<ConstituentImport>,
) -> Result<Json<ConstituentImportResult>, AppError> {
    info!("POST /imports/constituents/{} - Importing constituents", fund_id);

    let fund = db::security_queries::fetch_one(&state.pool, fund_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Security {} not found", fund_id)))?;
    if !fund.kind.is_fund() {
        return Err(AppError::Validation(format!(
            "Security {} is not a fund",
            fund.symbol
        )));
    }

    let raw = csv_import_service::parse_constituents(&data.csv)?;
    let universe = SecurityUniverse::new(db::security_queries::fetch_all(&state.pool).await?);

    let warnings = Warnings::bound();
    let resolved = resolver::resolve_constituents(
        &fund.symbol,
        &fund.name,
        &fund.currency,
        raw,
        &universe,
        &warnings,
    );
    if resolved.is_empty() {
        return Err(AppError::DataIntegrity(format!(
            "Fund {} resolved to an empty constituent set",
            fund.symbol
        )));
    }

    let today = Utc::now().date_naive();
    db::constituent_queries::upsert_resolved(
        &state.pool,
        fund.id,
        &resolved,
        today,
        today + Duration::days(PULL_INTERVAL_DAYS),
    )
    .await?;

    Ok(Json(ConstituentImportResult {
        imported: resolved.len(),
        warnings: warnings.drain(),
    }))
}
