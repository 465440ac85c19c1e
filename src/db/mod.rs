pub mod constituent_queries;
pub mod event_queries;
pub mod portfolio_queries;
pub mod price_queries;
pub mod security_queries;
pub mod treasury_queries;
