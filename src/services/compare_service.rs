use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use futures::future::{try_join, try_join_all};
use tracing::info;

use crate::db;
use crate::errors::AppError;
use crate::models::{
    BasketSet, CompareResponse, Membership, MembershipView, PerformanceMetrics, Portfolio,
    PortfolioKind, PortfolioMetrics, PortfolioView, SecurityKind, SecurityUniverse,
};
use crate::services::basket::{self, BasketHolding, PoolHolding};
use crate::services::context::RequestContext;
use crate::services::expansion::{self, Expansion};
use crate::services::valuation::{
    self, SecuritySeries, ValuedPosition, IDEAL_SEED_VALUE,
};
use crate::services::warnings::{WarningCode, Warnings};
use crate::services::{price_service, similarity, treasury_service};
use crate::state::AppState;

/// Compare two portfolios over a date range: expand both, value both,
/// score the overlap, and run the basket analysis when A is ideal.
pub async fn compare(
    state: &AppState,
    a_id: i64,
    b_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<CompareResponse, AppError> {
    if start > end {
        return Err(AppError::Validation(format!(
            "start_date {} is after end_date {}",
            start, end
        )));
    }

    let portfolio_a = db::portfolio_queries::fetch_one(&state.pool, a_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Portfolio {} not found", a_id)))?;
    let portfolio_b = db::portfolio_queries::fetch_one(&state.pool, b_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Portfolio {} not found", b_id)))?;
    let memberships_a = db::portfolio_queries::fetch_memberships(&state.pool, a_id).await?;
    let memberships_b = db::portfolio_queries::fetch_memberships(&state.pool, b_id).await?;

    let universe = SecurityUniverse::new(db::security_queries::fetch_all(&state.pool).await?);

    let ctx = RequestContext {
        pool: &state.pool,
        provider: state.provider.as_ref(),
        limiter: &state.limiter,
        flights: &state.flights,
        warnings: Warnings::bound(),
    };

    // The two expansions are independent.
    let (expansion_a, expansion_b) = try_join(
        expansion::expand_portfolio(&ctx, &universe, &portfolio_a, &memberships_a, end),
        expansion::expand_portfolio(&ctx, &universe, &portfolio_b, &memberships_b, end),
    )
    .await?;

    // No value series can start before the youngest security in play.
    let effective_start = adjust_start(&ctx, &universe, start, &[&expansion_a, &expansion_b]);

    let yields = treasury_service::yield_series(&ctx, effective_start, end).await?;

    let (metrics_a, metrics_b) = try_join(
        portfolio_metrics(&ctx, &universe, &portfolio_a, &memberships_a, effective_start, end, &yields),
        portfolio_metrics(&ctx, &universe, &portfolio_b, &memberships_b, effective_start, end, &yields),
    )
    .await?;

    let absolute_similarity_score = similarity::overlap_score(
        &expansion::weight_vector(&expansion_a.leaves),
        &expansion::weight_vector(&expansion_b.leaves),
    );

    // Basket analysis only makes sense against declared target weights.
    let baskets = (portfolio_a.kind == PortfolioKind::Ideal)
        .then(|| basket_analysis(&expansion_a, &expansion_b));

    info!(
        "Compared portfolios {} and {} over {}..{} (similarity {:.4})",
        a_id, b_id, effective_start, end, absolute_similarity_score
    );

    Ok(CompareResponse {
        portfolio_a: portfolio_view(&portfolio_a, &memberships_a, &universe, &expansion_a),
        portfolio_b: portfolio_view(&portfolio_b, &memberships_b, &universe, &expansion_b),
        absolute_similarity_score,
        performance_metrics: PerformanceMetrics {
            portfolio_a_metrics: metrics_a,
            portfolio_b_metrics: metrics_b,
        },
        baskets,
        warnings: ctx.warnings.drain(),
    })
}

// Move the start up to the latest inception date across the direct holdings
// and expanded leaves of both portfolios.
fn adjust_start(
    ctx: &RequestContext<'_>,
    universe: &SecurityUniverse,
    requested: NaiveDate,
    expansions: &[&Expansion],
) -> NaiveDate {
    let inceptions = expansions.iter().flat_map(|expansion| {
        let direct = expansion
            .direct
            .iter()
            .filter_map(|d| d.security.inception_date);
        let leaves = expansion
            .leaves
            .iter()
            .filter_map(|leaf| universe.get(leaf.security_id).and_then(|s| s.inception_date));
        direct.chain(leaves).collect::<Vec<_>>()
    });

    match adjusted_start_date(requested, inceptions) {
        Some(adjusted) => {
            ctx.warnings.push(
                WarningCode::StartDateAdjusted,
                format!(
                    "Start date moved from {} to {} to match the latest inception date in play",
                    requested, adjusted
                ),
            );
            adjusted
        }
        None => requested,
    }
}

/// The start date a window must move up to, if any inception in play is
/// later than the requested start.
pub fn adjusted_start_date(
    requested: NaiveDate,
    inceptions: impl IntoIterator<Item = NaiveDate>,
) -> Option<NaiveDate> {
    inceptions
        .into_iter()
        .max()
        .filter(|&inception| inception > requested)
}

async fn portfolio_metrics(
    ctx: &RequestContext<'_>,
    universe: &SecurityUniverse,
    portfolio: &Portfolio,
    memberships: &[Membership],
    start: NaiveDate,
    end: NaiveDate,
    yields: &BTreeMap<NaiveDate, f64>,
) -> Result<PortfolioMetrics, AppError> {
    let positions = try_join_all(
        memberships
            .iter()
            .map(|m| load_position(ctx, universe, portfolio.kind, m, start, end)),
    )
    .await?;

    let mut daily_values = match portfolio.kind {
        PortfolioKind::Ideal => valuation::daily_values_ideal(&positions, start, end, IDEAL_SEED_VALUE),
        PortfolioKind::Active => valuation::daily_values_active(&positions, start, end),
    };
    for value in &mut daily_values {
        value.value = finite(value.value);
    }

    let (start_value, end_value, gain_dollar, gain_percent) =
        valuation::performance_summary(&daily_values);
    let sharpe = valuation::sharpe_ratio(&daily_values, yields);

    Ok(PortfolioMetrics {
        start_value: finite(start_value),
        end_value: finite(end_value),
        gain_dollar: finite(gain_dollar),
        gain_percent: finite(gain_percent),
        sharpe: finite(sharpe),
        daily_values,
    })
}

async fn load_position(
    ctx: &RequestContext<'_>,
    universe: &SecurityUniverse,
    kind: PortfolioKind,
    membership: &Membership,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ValuedPosition, AppError> {
    let security = universe.get(membership.security_id).ok_or_else(|| {
        AppError::DataIntegrity(format!("Unknown security {}", membership.security_id))
    })?;

    let series = if security.kind == SecurityKind::Treasury {
        SecuritySeries {
            closes: treasury_service::yield_series(ctx, start, end).await?,
            splits: Vec::new(),
        }
    } else {
        price_service::load_series(ctx, security, start, end).await?
    };

    let quantity = match kind {
        PortfolioKind::Ideal => membership.weight.unwrap_or(0.0),
        PortfolioKind::Active => membership.shares.unwrap_or(0.0),
    };
    Ok(ValuedPosition { quantity, series })
}

fn basket_analysis(expansion_a: &Expansion, expansion_b: &Expansion) -> BasketSet {
    let a_symbols: HashSet<String> = expansion_a
        .direct
        .iter()
        .map(|d| d.security.symbol.clone())
        .collect();

    let pool_holdings: Vec<PoolHolding> = expansion_b
        .direct
        .iter()
        .map(|d| PoolHolding {
            symbol: d.security.symbol.clone(),
            allocation: d.allocation,
            constituents: d
                .constituents
                .as_ref()
                .map(|cs| cs.iter().map(|c| (c.symbol.clone(), c.weight)).collect()),
        })
        .collect();
    let pool = basket::build_redemption_pool(&pool_holdings, &a_symbols);

    let holdings: Vec<BasketHolding> = expansion_a
        .direct
        .iter()
        .map(|d| BasketHolding {
            symbol: d.security.symbol.clone(),
            ideal_alloc: d.allocation,
            constituents: d
                .constituents
                .as_ref()
                .map(|cs| cs.iter().map(|c| (c.symbol.clone(), c.weight)).collect()),
        })
        .collect();

    basket::analyze(&holdings, &pool)
}

fn portfolio_view(
    portfolio: &Portfolio,
    memberships: &[Membership],
    universe: &SecurityUniverse,
    expansion: &Expansion,
) -> PortfolioView {
    PortfolioView {
        id: portfolio.id,
        name: portfolio.name.clone(),
        kind: portfolio.kind,
        memberships: memberships
            .iter()
            .map(|m| MembershipView {
                security_id: m.security_id,
                symbol: universe
                    .get(m.security_id)
                    .map(|s| s.symbol.clone())
                    .unwrap_or_default(),
                weight: m.weight,
                shares: m.shares,
            })
            .collect(),
        expanded_memberships: expansion.leaves.clone(),
    }
}

// JSON must never carry NaN or infinity; degenerate math reduces to 0.
fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
