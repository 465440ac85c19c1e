use chrono::NaiveDate;
use serde::Serialize;

// One line of a provider fund-holdings file, before resolution. The symbol
// may be empty or a no-symbol sentinel (swaps, cash offsets), the weight may
// be negative, and the name often carries SWAP / CLASS A / .COM suffixes.
#[derive(Debug, Clone)]
pub struct RawConstituent {
    pub symbol: String,
    pub name: String,
    pub weight: f64,
}

/// A resolved underlying holding of a fund; weights sum to 1 per fund.
#[derive(Debug, Clone, Serialize)]
pub struct FundConstituent {
    pub security_id: i64,
    pub symbol: String,
    pub weight: f64,
}

/// Resolved constituents plus the freshness record that gates re-pulls.
#[derive(Debug, Clone)]
pub struct ConstituentSet {
    pub fund_id: i64,
    pub constituents: Vec<FundConstituent>,
    pub pulled_at: NaiveDate,
    pub next_due: NaiveDate,
}
