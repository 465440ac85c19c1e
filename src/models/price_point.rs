use bigdecimal::BigDecimal;
use chrono::NaiveDate;

/// One cached daily close for a security.
#[derive(Debug, Clone)]
pub struct PricePoint {
    pub security_id: i64,
    pub date: NaiveDate,
    pub close: BigDecimal,
}

// Which span of dates has been materialized for a security, and when the
// cache should be refreshed. Requests outside [range_start, range_end]
// trigger a provider fetch that extends the range.
#[derive(Debug, Clone)]
pub struct PriceRange {
    pub security_id: i64,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub next_due: chrono::DateTime<chrono::Utc>,
}
