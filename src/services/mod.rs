pub mod basket;
pub mod compare_service;
pub mod constituent_service;
pub mod context;
pub mod csv_import_service;
pub mod expansion;
pub mod listing;
pub mod portfolio_service;
pub mod price_service;
pub mod rate_limiter;
pub mod resolver;
pub mod similarity;
pub mod single_flight;
pub mod treasury_service;
pub mod valuation;
pub mod warnings;
