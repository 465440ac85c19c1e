mod compare;
mod constituent;
mod corporate_action;
mod portfolio;
mod price_point;
mod security;
mod treasury;

pub use compare::{
    BasketHoldingFill, BasketLevel, BasketSet, CompareResponse, DailyValue, ExpandedMembership,
    MembershipView, PerformanceMetrics, PortfolioMetrics, PortfolioView, SourceAllocation,
};
pub use constituent::{ConstituentSet, FundConstituent, RawConstituent};
pub use corporate_action::CorporateAction;
pub use portfolio::{CreateMembership, CreatePortfolio, Membership, Portfolio, PortfolioKind};
pub use price_point::{PricePoint, PriceRange};
pub use security::{Security, SecurityKind, SecurityUniverse};
pub use treasury::YieldPoint;
