use chrono::NaiveDate;
use serde::Serialize;

use crate::models::PortfolioKind;
use crate::services::warnings::Warning;

/// The full payload of one compare operation.
#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub portfolio_a: PortfolioView,
    pub portfolio_b: PortfolioView,
    pub absolute_similarity_score: f64,
    pub performance_metrics: PerformanceMetrics,
    // Absent (not null) when portfolio A is not an ideal portfolio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baskets: Option<BasketSet>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Serialize)]
pub struct PortfolioView {
    pub id: i64,
    pub name: String,
    pub kind: PortfolioKind,
    pub memberships: Vec<MembershipView>,
    pub expanded_memberships: Vec<ExpandedMembership>,
}

#[derive(Debug, Serialize)]
pub struct MembershipView {
    pub security_id: i64,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
}

// One leaf of a flattened portfolio. Source allocations record which
// top-level holding contributed what fraction of the leaf; they sum to 1.
#[derive(Debug, Clone, Serialize)]
pub struct ExpandedMembership {
    pub security_id: i64,
    pub symbol: String,
    pub allocation: f64,
    pub sources: Vec<SourceAllocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceAllocation {
    pub security_id: i64,
    pub symbol: String,
    pub allocation: f64,
}

#[derive(Debug, Serialize)]
pub struct PerformanceMetrics {
    pub portfolio_a_metrics: PortfolioMetrics,
    pub portfolio_b_metrics: PortfolioMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioMetrics {
    pub start_value: f64,
    pub end_value: f64,
    pub gain_dollar: f64,
    pub gain_percent: f64,
    pub sharpe: f64,
    pub daily_values: Vec<DailyValue>,
}

/// chrono serializes `NaiveDate` as `YYYY-MM-DD`, which is the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyValue {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct BasketSet {
    pub basket_20: BasketLevel,
    pub basket_40: BasketLevel,
    pub basket_60: BasketLevel,
    pub basket_80: BasketLevel,
    pub basket_100: BasketLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasketLevel {
    pub threshold: f64,
    pub total_fill: f64,
    pub holdings: Vec<BasketHoldingFill>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasketHoldingFill {
    pub symbol: String,
    pub ideal_alloc: f64,
    pub direct_fill: f64,
    pub redeemed_fill: f64,
    pub coverage_weight: f64,
}
