use std::collections::BTreeMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::external::market_provider::{
    MarketDataProvider, MarketProviderError, ProviderBar, ProviderFundHolding, ProviderListing,
    ProviderYieldPoint,
};

const BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn from_env() -> Result<Self, MarketProviderError> {
        let api_key = std::env::var("ALPHAVANTAGE_API_KEY")
            .map_err(|_| MarketProviderError::BadResponse("ALPHAVANTAGE_API_KEY not set".into()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
        })
    }

    async fn get_text(&self, query: &[(&str, &str)]) -> Result<String, MarketProviderError> {
        let resp = self
            .client
            .get(BASE_URL)
            .query(query)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| MarketProviderError::Network(e.to_string()))?;
        resp.text()
            .await
            .map_err(|e| MarketProviderError::Network(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct AvDailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<BTreeMap<String, AvDailyBar>>,

    // When rate-limited Alpha Vantage returns:
    // { "Note": "Thank you for using Alpha Vantage! ... 5 calls per minute ..." }
    #[serde(rename = "Note")]
    note: Option<String>,

    // When invalid:
    // { "Error Message": "Invalid API call. ..." }
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvDailyBar {
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "7. dividend amount")]
    dividend: String,
    #[serde(rename = "8. split coefficient")]
    split_coefficient: String,
}

#[derive(Debug, Deserialize)]
struct AvEtfProfileResponse {
    holdings: Option<Vec<AvEtfHolding>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvEtfHolding {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    description: String,
    weight: String,
}

#[derive(Debug, Deserialize)]
struct AvTreasuryResponse {
    data: Option<Vec<AvTreasuryPoint>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvTreasuryPoint {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct AvListingRow {
    symbol: String,
    name: String,
    exchange: String,
    #[serde(rename = "assetType")]
    asset_type: String,
    #[serde(rename = "ipoDate")]
    ipo_date: String,
}

fn check_throttle(
    note: Option<String>,
    error_message: Option<String>,
) -> Result<(), MarketProviderError> {
    if note.is_some() {
        return Err(MarketProviderError::RateLimited);
    }
    if let Some(msg) = error_message {
        return Err(MarketProviderError::BadResponse(msg));
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate, MarketProviderError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| MarketProviderError::Parse(e.to_string()))
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    async fn list_securities(&self) -> Result<Vec<ProviderListing>, MarketProviderError> {
        // LISTING_STATUS is the one CSV endpoint.
        let text = self
            .get_text(&[("function", "LISTING_STATUS"), ("state", "active")])
            .await?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let mut out = Vec::new();
        for row in reader.deserialize::<AvListingRow>() {
            let row = row.map_err(|e| MarketProviderError::Parse(e.to_string()))?;
            let ipo_date = NaiveDate::parse_from_str(&row.ipo_date, "%Y-%m-%d").ok();
            out.push(ProviderListing {
                symbol: row.symbol,
                name: row.name,
                exchange: row.exchange,
                asset_type: row.asset_type,
                ipo_date,
            });
        }
        Ok(out)
    }

    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderBar>, MarketProviderError> {
        // outputsize=compact covers ~100 points; anything older needs full.
        let outputsize = if (end - start).num_days() <= 100 { "compact" } else { "full" };
        let text = self
            .get_text(&[
                ("function", "TIME_SERIES_DAILY_ADJUSTED"),
                ("symbol", symbol),
                ("outputsize", outputsize),
            ])
            .await?;

        let body: AvDailyResponse =
            serde_json::from_str(&text).map_err(|e| MarketProviderError::Parse(e.to_string()))?;
        check_throttle(body.note, body.error_message)?;

        let series = body
            .time_series
            .ok_or_else(|| MarketProviderError::BadResponse("missing time series".into()))?;

        // series is keyed by "YYYY-MM-DD" strings; BTreeMap sorts ascending.
        series
            .into_iter()
            .filter(|(date_str, _)| {
                parse_date(date_str).map(|d| d >= start && d <= end).unwrap_or(false)
            })
            .map(|(date_str, bar)| {
                let date = parse_date(&date_str)?;
                let close = bar
                    .close
                    .parse::<BigDecimal>()
                    .map_err(|e| MarketProviderError::Parse(e.to_string()))?;
                let split_coefficient = bar
                    .split_coefficient
                    .parse::<f64>()
                    .map_err(|e| MarketProviderError::Parse(e.to_string()))?;
                let dividend = bar
                    .dividend
                    .parse::<f64>()
                    .map_err(|e| MarketProviderError::Parse(e.to_string()))?;
                Ok(ProviderBar {
                    date,
                    close,
                    split_coefficient,
                    dividend,
                })
            })
            .collect()
    }

    async fn fetch_fund_holdings(
        &self,
        symbol: &str,
    ) -> Result<Vec<ProviderFundHolding>, MarketProviderError> {
        let text = self
            .get_text(&[("function", "ETF_PROFILE"), ("symbol", symbol)])
            .await?;

        let body: AvEtfProfileResponse =
            serde_json::from_str(&text).map_err(|e| MarketProviderError::Parse(e.to_string()))?;
        check_throttle(body.note, body.error_message)?;

        let holdings = body.holdings.ok_or(MarketProviderError::NotFound)?;
        holdings
            .into_iter()
            .map(|h| {
                let weight = h
                    .weight
                    .trim_end_matches('%')
                    .parse::<f64>()
                    .map_err(|e| MarketProviderError::Parse(e.to_string()))?;
                Ok(ProviderFundHolding {
                    symbol: h.symbol,
                    name: h.description,
                    weight,
                })
            })
            .collect()
    }

    async fn fetch_treasury_yields(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderYieldPoint>, MarketProviderError> {
        let text = self
            .get_text(&[
                ("function", "TREASURY_YIELD"),
                ("interval", "daily"),
                ("maturity", "10year"),
            ])
            .await?;

        let body: AvTreasuryResponse =
            serde_json::from_str(&text).map_err(|e| MarketProviderError::Parse(e.to_string()))?;
        check_throttle(body.note, body.error_message)?;

        let data = body
            .data
            .ok_or_else(|| MarketProviderError::BadResponse("missing yield data".into()))?;

        let mut out = Vec::new();
        for point in data {
            let date = parse_date(&point.date)?;
            if date < start || date > end {
                continue;
            }
            // Holidays are reported as "." and carry no value.
            if let Ok(rate) = point.value.parse::<f64>() {
                out.push(ProviderYieldPoint { date, rate });
            }
        }
        out.sort_by_key(|p| p.date);
        Ok(out)
    }
}
