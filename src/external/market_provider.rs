use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use thiserror::Error;

/// One row of the provider's listing universe.
#[derive(Debug, Clone)]
pub struct ProviderListing {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub asset_type: String,
    pub ipo_date: Option<NaiveDate>,
}

/// One adjusted daily bar. The split coefficient is 1.0 on ordinary days.
#[derive(Debug, Clone)]
pub struct ProviderBar {
    pub date: NaiveDate,
    pub close: BigDecimal,
    pub split_coefficient: f64,
    pub dividend: f64,
}

/// One line of a fund-holdings file, exactly as the provider reports it.
#[derive(Debug, Clone)]
pub struct ProviderFundHolding {
    pub symbol: String,
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct ProviderYieldPoint {
    pub date: NaiveDate,
    pub rate: f64,
}

#[derive(Debug, Error)]
pub enum MarketProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("symbol not found")]
    NotFound,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// The full listing universe (active symbols).
    async fn list_securities(&self) -> Result<Vec<ProviderListing>, MarketProviderError>;

    /// Daily closes, split coefficients and dividends over a date range.
    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderBar>, MarketProviderError>;

    /// The raw constituent list of an ETF or mutual fund.
    async fn fetch_fund_holdings(
        &self,
        symbol: &str,
    ) -> Result<Vec<ProviderFundHolding>, MarketProviderError>;

    /// Daily 10-year treasury yields over a date range, as annualized percents.
    async fn fetch_treasury_yields(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderYieldPoint>, MarketProviderError>;
}
