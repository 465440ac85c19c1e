pub mod alphavantage;
pub mod market_provider;
