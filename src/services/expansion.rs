use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use futures::future::try_join_all;
use tracing::warn;

use crate::errors::AppError;
use crate::models::{
    ExpandedMembership, FundConstituent, Membership, Portfolio, PortfolioKind, Security,
    SecurityKind, SecurityUniverse, SourceAllocation,
};
use crate::services::context::RequestContext;
use crate::services::warnings::WarningCode;
use crate::services::{constituent_service, price_service, treasury_service, valuation};

// One top-level holding with its share of the portfolio and, for funds, the
// equity-level constituent map it distributes into.
#[derive(Debug, Clone)]
pub struct DirectHolding {
    pub security: Security,
    pub allocation: f64,
    pub constituents: Option<Vec<FundConstituent>>,
}

/// A fully expanded portfolio: the direct view and the flattened leaves.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub direct: Vec<DirectHolding>,
    pub leaves: Vec<ExpandedMembership>,
}

/// Flatten a portfolio into leaf-level allocations with source attribution.
/// Funds that cannot be expanded stay as direct leaves with a warning; the
/// rest of the expansion proceeds.
pub async fn expand_portfolio(
    ctx: &RequestContext<'_>,
    universe: &SecurityUniverse,
    portfolio: &Portfolio,
    memberships: &[Membership],
    as_of: NaiveDate,
) -> Result<Expansion, AppError> {
    let allocations = direct_allocations(ctx, universe, portfolio, memberships, as_of).await?;

    let mut direct = Vec::with_capacity(allocations.len());
    for (security, allocation) in allocations {
        let constituents = if security.kind.is_fund() {
            match flatten_fund(ctx, universe, &security).await {
                Ok(constituents) => Some(constituents),
                Err(AppError::NotFound(_)) => {
                    warn!("Leaving fund {} unexpanded", security.symbol);
                    ctx.warnings.push(
                        WarningCode::FundExpansionFailed,
                        format!(
                            "Fund {} could not be expanded and was kept as a direct holding",
                            security.symbol
                        ),
                    );
                    None
                }
                Err(fatal) => return Err(fatal),
            }
        } else {
            None
        };
        direct.push(DirectHolding {
            security,
            allocation,
            constituents,
        });
    }

    let leaves = accumulate_leaves(&direct);
    Ok(Expansion { direct, leaves })
}

// Direct allocations per membership: stored weights for an ideal portfolio,
// price-weighted share counts (split-adjusted, as-of snapshot) for an
// active one.
async fn direct_allocations(
    ctx: &RequestContext<'_>,
    universe: &SecurityUniverse,
    portfolio: &Portfolio,
    memberships: &[Membership],
    as_of: NaiveDate,
) -> Result<Vec<(Security, f64)>, AppError> {
    let securities: Vec<Security> = memberships
        .iter()
        .map(|m| {
            universe.get(m.security_id).cloned().ok_or_else(|| {
                AppError::DataIntegrity(format!(
                    "Portfolio {} references unknown security {}",
                    portfolio.id, m.security_id
                ))
            })
        })
        .collect::<Result<_, _>>()?;

    match portfolio.kind {
        PortfolioKind::Ideal => Ok(securities
            .into_iter()
            .zip(memberships)
            .map(|(security, m)| (security, m.weight.unwrap_or(0.0)))
            .collect()),
        PortfolioKind::Active => {
            let values = try_join_all(
                securities
                    .iter()
                    .zip(memberships)
                    .map(|(security, m)| market_value(ctx, security, m.shares.unwrap_or(0.0), as_of)),
            )
            .await?;

            let total: f64 = values.iter().sum();
            Ok(securities
                .into_iter()
                .zip(values)
                .map(|(security, value)| {
                    let allocation = if total > 0.0 { value / total } else { 0.0 };
                    (security, allocation)
                })
                .collect())
        }
    }
}

async fn market_value(
    ctx: &RequestContext<'_>,
    security: &Security,
    shares: f64,
    as_of: NaiveDate,
) -> Result<f64, AppError> {
    if security.kind == SecurityKind::Treasury {
        // Treasuries have no exchange close; the tolerant yield lookup
        // stands in for the price.
        let yields =
            treasury_service::yield_series(ctx, as_of - Duration::days(7), as_of).await?;
        let rate = yields.range(..=as_of).next_back().map(|(_, &r)| r).unwrap_or(0.0);
        return Ok(shares * rate);
    }

    let series = price_service::load_series(ctx, security, as_of, as_of).await?;
    Ok(valuation::market_value_on(shares, &series, as_of).unwrap_or(0.0))
}

// Flatten a fund to equity-level constituents, following nested funds.
// Each level's weights sum to 1, so the multiplied-out map does too. A
// nested fund that cannot be expanded stays in the map as itself; a cycle
// is dropped with a warning.
async fn flatten_fund(
    ctx: &RequestContext<'_>,
    universe: &SecurityUniverse,
    fund: &Security,
) -> Result<Vec<FundConstituent>, AppError> {
    let mut visited: HashSet<i64> = HashSet::from([fund.id]);
    let mut order: Vec<i64> = Vec::new();
    let mut flat: HashMap<i64, FundConstituent> = HashMap::new();
    let mut pending: Vec<(Security, f64)> = vec![(fund.clone(), 1.0)];

    while let Some((current, multiplier)) = pending.pop() {
        let constituents = if current.id == fund.id {
            constituent_service::get_resolved(ctx, &current, universe).await?
        } else {
            match constituent_service::get_resolved(ctx, &current, universe).await {
                Ok(constituents) => constituents,
                Err(AppError::NotFound(_)) => {
                    ctx.warnings.push(
                        WarningCode::FundExpansionFailed,
                        format!(
                            "Nested fund {} could not be expanded and was kept as a constituent",
                            current.symbol
                        ),
                    );
                    accumulate(&mut flat, &mut order, current.id, &current.symbol, multiplier);
                    continue;
                }
                Err(fatal) => return Err(fatal),
            }
        };

        for constituent in constituents {
            match universe.get(constituent.security_id) {
                Some(nested) if nested.kind.is_fund() => {
                    if visited.insert(nested.id) {
                        pending.push((nested.clone(), multiplier * constituent.weight));
                    } else {
                        ctx.warnings.push(
                            WarningCode::FundExpansionFailed,
                            format!(
                                "Dropped cyclic constituent {} while expanding {}",
                                nested.symbol, fund.symbol
                            ),
                        );
                    }
                }
                _ => accumulate(
                    &mut flat,
                    &mut order,
                    constituent.security_id,
                    &constituent.symbol,
                    multiplier * constituent.weight,
                ),
            }
        }
    }

    Ok(order.into_iter().filter_map(|id| flat.remove(&id)).collect())
}

fn accumulate(
    flat: &mut HashMap<i64, FundConstituent>,
    order: &mut Vec<i64>,
    security_id: i64,
    symbol: &str,
    weight: f64,
) {
    match flat.get_mut(&security_id) {
        Some(existing) => existing.weight += weight,
        None => {
            order.push(security_id);
            flat.insert(
                security_id,
                FundConstituent {
                    security_id,
                    symbol: symbol.to_string(),
                    weight,
                },
            );
        }
    }
}

// Fold direct holdings into leaves. A leaf reached over several paths sums
// their contributions; its source fractions normalize to 1. Zero-weight
// leaves are dropped rather than producing NaN fractions.
pub fn accumulate_leaves(direct: &[DirectHolding]) -> Vec<ExpandedMembership> {
    struct LeafAccumulator {
        symbol: String,
        total: f64,
        source_order: Vec<i64>,
        sources: HashMap<i64, (String, f64)>,
    }

    let mut order: Vec<i64> = Vec::new();
    let mut leaves: HashMap<i64, LeafAccumulator> = HashMap::new();

    let mut contribute = |security_id: i64, symbol: &str, source: &Security, amount: f64| {
        let leaf = leaves.entry(security_id).or_insert_with(|| {
            order.push(security_id);
            LeafAccumulator {
                symbol: symbol.to_string(),
                total: 0.0,
                source_order: Vec::new(),
                sources: HashMap::new(),
            }
        });
        leaf.total += amount;
        match leaf.sources.get_mut(&source.id) {
            Some((_, contribution)) => *contribution += amount,
            None => {
                leaf.source_order.push(source.id);
                leaf.sources.insert(source.id, (source.symbol.clone(), amount));
            }
        }
    };

    for holding in direct {
        match &holding.constituents {
            Some(constituents) => {
                for constituent in constituents {
                    contribute(
                        constituent.security_id,
                        &constituent.symbol,
                        &holding.security,
                        holding.allocation * constituent.weight,
                    );
                }
            }
            None => contribute(
                holding.security.id,
                &holding.security.symbol,
                &holding.security,
                holding.allocation,
            ),
        }
    }

    order
        .into_iter()
        .filter_map(|security_id| {
            let mut leaf = leaves.remove(&security_id)?;
            if leaf.total <= 0.0 {
                return None;
            }
            let sources = leaf
                .source_order
                .iter()
                .filter_map(|source_id| {
                    let (symbol, contribution) = leaf.sources.remove(source_id)?;
                    Some(SourceAllocation {
                        security_id: *source_id,
                        symbol,
                        allocation: contribution / leaf.total,
                    })
                })
                .collect();
            Some(ExpandedMembership {
                security_id,
                symbol: leaf.symbol,
                allocation: leaf.total,
                sources,
            })
        })
        .collect()
}

/// The symbol -> allocation view the similarity scorer and basket pool use.
pub fn weight_vector(leaves: &[ExpandedMembership]) -> HashMap<String, f64> {
    let mut vector: HashMap<String, f64> = HashMap::new();
    for leaf in leaves {
        *vector.entry(leaf.symbol.clone()).or_insert(0.0) += leaf.allocation;
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security(id: i64, symbol: &str, kind: SecurityKind) -> Security {
        Security {
            id,
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            exchange: "NYSE".to_string(),
            country: "USA".to_string(),
            currency: "USD".to_string(),
            inception_date: None,
            kind,
        }
    }

    fn constituent(id: i64, symbol: &str, weight: f64) -> FundConstituent {
        FundConstituent {
            security_id: id,
            symbol: symbol.to_string(),
            weight,
        }
    }

    #[test]
    fn direct_stocks_pass_through_as_their_own_source() {
        let direct = vec![DirectHolding {
            security: security(1, "AAPL", SecurityKind::CommonStock),
            allocation: 1.0,
            constituents: None,
        }];

        let leaves = accumulate_leaves(&direct);

        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].symbol, "AAPL");
        assert_eq!(leaves[0].allocation, 1.0);
        assert_eq!(leaves[0].sources.len(), 1);
        assert_eq!(leaves[0].sources[0].allocation, 1.0);
    }

    #[test]
    fn fund_allocations_distribute_by_constituent_weight() {
        let direct = vec![DirectHolding {
            security: security(10, "VTI", SecurityKind::Etf),
            allocation: 0.5,
            constituents: Some(vec![constituent(1, "AAPL", 0.6), constituent(2, "MSFT", 0.4)]),
        }];

        let leaves = accumulate_leaves(&direct);

        assert_eq!(leaves.len(), 2);
        assert!((leaves[0].allocation - 0.30).abs() < 1e-12);
        assert!((leaves[1].allocation - 0.20).abs() < 1e-12);
        assert_eq!(leaves[0].sources[0].security_id, 10);
    }

    // A leaf reached both directly and through a fund keeps one entry whose
    // sources record each path's share.
    #[test]
    fn multi_path_contributions_sum_and_sources_normalize() {
        let direct = vec![
            DirectHolding {
                security: security(1, "AAPL", SecurityKind::CommonStock),
                allocation: 0.30,
                constituents: None,
            },
            DirectHolding {
                security: security(10, "VTI", SecurityKind::Etf),
                allocation: 0.70,
                constituents: Some(vec![
                    constituent(1, "AAPL", 0.5),
                    constituent(2, "MSFT", 0.5),
                ]),
            },
        ];

        let leaves = accumulate_leaves(&direct);

        let aapl = leaves.iter().find(|l| l.symbol == "AAPL").unwrap();
        assert!((aapl.allocation - 0.65).abs() < 1e-12);
        let fraction_sum: f64 = aapl.sources.iter().map(|s| s.allocation).sum();
        assert!((fraction_sum - 1.0).abs() < 1e-12);
        let direct_source = aapl.sources.iter().find(|s| s.security_id == 1).unwrap();
        assert!((direct_source.allocation - 0.30 / 0.65).abs() < 1e-12);

        let total: f64 = leaves.iter().map(|l| l.allocation).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_weight_leaves_are_dropped() {
        let direct = vec![
            DirectHolding {
                security: security(1, "AAPL", SecurityKind::CommonStock),
                allocation: 1.0,
                constituents: None,
            },
            DirectHolding {
                security: security(2, "MSFT", SecurityKind::CommonStock),
                allocation: 0.0,
                constituents: None,
            },
        ];

        let leaves = accumulate_leaves(&direct);

        assert_eq!(leaves.len(), 1);
        assert!(leaves.iter().all(|l| l.allocation.is_finite()));
    }

    #[test]
    fn weight_vector_merges_duplicate_symbols() {
        let leaves = vec![
            ExpandedMembership {
                security_id: 1,
                symbol: "AAPL".to_string(),
                allocation: 0.4,
                sources: vec![],
            },
            ExpandedMembership {
                security_id: 2,
                symbol: "AAPL".to_string(),
                allocation: 0.1,
                sources: vec![],
            },
        ];
        let vector = weight_vector(&leaves);
        assert!((vector["AAPL"] - 0.5).abs() < 1e-12);
    }
}
