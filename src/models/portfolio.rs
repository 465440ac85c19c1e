use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioKind {
    /// Target weights, each in [0,1], summing to at most 1.
    Ideal,
    /// Share counts, non-negative, no upper bound.
    Active,
}

impl PortfolioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioKind::Ideal => "ideal",
            PortfolioKind::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ideal" => Some(PortfolioKind::Ideal),
            "active" => Some(PortfolioKind::Active),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub kind: PortfolioKind,
    pub objective: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

// One (portfolio, security) row. Ideal portfolios populate `weight`,
// active portfolios populate `shares`; never both.
#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub portfolio_id: i64,
    pub security_id: i64,
    pub weight: Option<f64>,
    pub shares: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePortfolio {
    pub name: String,
    pub owner: String,
    pub kind: PortfolioKind,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub memberships: Vec<CreateMembership>,
}

/// Exactly one of `security_id` and `ticker` must be set.
#[derive(Debug, Deserialize)]
pub struct CreateMembership {
    #[serde(default)]
    pub security_id: Option<i64>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub shares: Option<f64>,
}
