use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{CompareResponse, CreatePortfolio, Portfolio};
use crate::services::{compare_service, portfolio_service};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_portfolio).get(fetch_portfolios))
        .route("/:id", get(get_portfolio))
        .route("/:a/compare/:b", get(compare_portfolios))
}

#[axum::debug_handler]
pub async fn create_portfolio(
    State(state): State<AppState>,
    Json(data): Json<CreatePortfolio>,
) -> Result<Json<Portfolio>, AppError> {
    info!("POST /portfolios - Creating portfolio '{}'", data.name);
    let portfolio = portfolio_service::create(&state.pool, data).await.map_err(|e| {
        error!("Failed to create portfolio: {}", e);
        e
    })?;
    Ok(Json(portfolio))
}

pub async fn fetch_portfolios(
    State(state): State<AppState>,
) -> Result<Json<Vec<Portfolio>>, AppError> {
    info!("GET /portfolios - Fetching all portfolios");
    let portfolios = portfolio_service::fetch_all(&state.pool).await.map_err(|e| {
        error!("Failed to fetch portfolios: {}", e);
        e
    })?;
    Ok(Json(portfolios))
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Portfolio>, AppError> {
    info!("GET /portfolios/{} - Fetching portfolio", id);
    let portfolio = portfolio_service::fetch_one(&state.pool, id).await.map_err(|e| {
        error!("Failed to fetch portfolio {}: {}", id, e);
        e
    })?;
    Ok(Json(portfolio))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub async fn compare_portfolios(
    State(state): State<AppState>,
    Path((a, b)): Path<(i64, i64)>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<CompareResponse>, AppError> {
    info!(
        "GET /portfolios/{}/compare/{} - Comparing over {}..{}",
        a, b, query.start_date, query.end_date
    );
    let response = compare_service::compare(&state, a, b, query.start_date, query.end_date)
        .await
        .map_err(|e| {
            error!("Failed to compare portfolios {} and {}: {}", a, b, e);
            e
        })?;
    Ok(Json(response))
}
