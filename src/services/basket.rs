use std::collections::{HashMap, HashSet};

use crate::models::{BasketHoldingFill, BasketLevel, BasketSet};

/// Coverage thresholds the analysis is reported at.
pub const THRESHOLDS: [f64; 5] = [0.20, 0.40, 0.60, 0.80, 1.00];

const POOL_EPSILON: f64 = 1e-12;

// One holding of portfolio A as the analyzer sees it: its declared target
// allocation plus, for funds, the resolved constituent map (summing to 1).
#[derive(Debug, Clone)]
pub struct BasketHolding {
    pub symbol: String,
    pub ideal_alloc: f64,
    pub constituents: Option<HashMap<String, f64>>,
}

/// One holding of portfolio B as it feeds the redemption pool.
#[derive(Debug, Clone)]
pub struct PoolHolding {
    pub symbol: String,
    pub allocation: f64,
    pub constituents: Option<HashMap<String, f64>>,
}

// Build B's redemption pool. Funds in B flatten into their constituents,
// except a fund whose symbol portfolio A holds directly: that one stays
// whole so it can direct-fill the matching A holding instead of appearing
// twice.
pub fn build_redemption_pool(
    b_holdings: &[PoolHolding],
    a_symbols: &HashSet<String>,
) -> HashMap<String, f64> {
    let mut pool: HashMap<String, f64> = HashMap::new();
    for holding in b_holdings {
        match &holding.constituents {
            Some(constituents) if !a_symbols.contains(&holding.symbol) => {
                for (symbol, weight) in constituents {
                    *pool.entry(symbol.clone()).or_insert(0.0) += holding.allocation * weight;
                }
            }
            _ => {
                *pool.entry(holding.symbol.clone()).or_insert(0.0) += holding.allocation;
            }
        }
    }
    pool
}

/// Run the redemption analysis at every threshold.
pub fn analyze(holdings: &[BasketHolding], pool: &HashMap<String, f64>) -> BasketSet {
    let mut levels = THRESHOLDS.iter().map(|&t| analyze_level(holdings, pool, t));
    BasketSet {
        basket_20: levels.next().unwrap(),
        basket_40: levels.next().unwrap(),
        basket_60: levels.next().unwrap(),
        basket_80: levels.next().unwrap(),
        basket_100: levels.next().unwrap(),
    }
}

// One threshold, on a fresh copy of the pool. Strictly sequential: fills
// and round-robin redemption consume pool mass in A's declared order, so
// the output is deterministic and a shared constituent is never redeemed
// twice.
fn analyze_level(holdings: &[BasketHolding], pool: &HashMap<String, f64>, threshold: f64) -> BasketLevel {
    let mut pool = pool.clone();

    // Direct fills first: B holding the same symbol satisfies the holding
    // up to its target allocation.
    let mut fills: Vec<BasketHoldingFill> = holdings
        .iter()
        .map(|holding| {
            let available = pool.get(&holding.symbol).copied().unwrap_or(0.0).max(0.0);
            let direct_fill = holding.ideal_alloc.min(available);
            if direct_fill > 0.0 {
                *pool.get_mut(&holding.symbol).unwrap() -= direct_fill;
            }
            BasketHoldingFill {
                symbol: holding.symbol.clone(),
                ideal_alloc: holding.ideal_alloc,
                direct_fill,
                redeemed_fill: 0.0,
                coverage_weight: 0.0,
            }
        })
        .collect();

    // Coverage: the fraction of each fund's composition still present in
    // the pool after direct fills. Decided once per threshold, before any
    // redemption.
    for (holding, fill) in holdings.iter().zip(fills.iter_mut()) {
        if let Some(constituents) = &holding.constituents {
            fill.coverage_weight = constituents
                .iter()
                .filter(|(symbol, _)| pool.get(*symbol).copied().unwrap_or(0.0) > POOL_EPSILON)
                .map(|(_, weight)| weight)
                .sum();
        }
    }

    // Round-robin redemption over eligible funds. Each take is capped at
    // the fund's own constituent weight, so a fund never grabs more of a
    // pool symbol than its composition warrants.
    for (holding, fill) in holdings.iter().zip(fills.iter_mut()) {
        let Some(constituents) = &holding.constituents else {
            continue;
        };
        if fill.coverage_weight + POOL_EPSILON < threshold {
            continue;
        }
        let mut redeemed = 0.0;
        for (symbol, weight) in constituents {
            let Some(available) = pool.get_mut(symbol) else {
                continue;
            };
            let take = weight.min(available.max(0.0));
            if take > 0.0 {
                *available -= take;
                redeemed += take;
            }
        }
        fill.redeemed_fill = redeemed;
    }

    let total_fill = fills.iter().map(|f| f.direct_fill + f.redeemed_fill).sum();
    BasketLevel {
        threshold,
        total_fill,
        holdings: fills,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constituents(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(s, w)| (s.to_string(), *w)).collect()
    }

    fn stock(symbol: &str, alloc: f64) -> BasketHolding {
        BasketHolding {
            symbol: symbol.to_string(),
            ideal_alloc: alloc,
            constituents: None,
        }
    }

    fn fund(symbol: &str, alloc: f64, weights: &[(&str, f64)]) -> BasketHolding {
        BasketHolding {
            symbol: symbol.to_string(),
            ideal_alloc: alloc,
            constituents: Some(constituents(weights)),
        }
    }

    fn level_fill<'a>(level: &'a BasketLevel, symbol: &str) -> &'a crate::models::BasketHoldingFill {
        level.holdings.iter().find(|h| h.symbol == symbol).unwrap()
    }

    // Scenario: B holds the fund itself at 0.10 plus most of its underlying
    // stocks. At loose thresholds the fund redeems the remainder; at tight
    // thresholds it is blocked and only the direct fills survive.
    #[test]
    fn thresholds_gate_redemption() {
        let holdings = vec![
            fund("ETF1", 0.60, &[("S1", 0.40), ("S2", 0.30), ("S3", 0.30)]),
            stock("S4", 0.40),
        ];
        let b_holdings = vec![
            PoolHolding {
                symbol: "S1".to_string(),
                allocation: 0.35,
                constituents: None,
            },
            PoolHolding {
                symbol: "S2".to_string(),
                allocation: 0.25,
                constituents: None,
            },
            PoolHolding {
                symbol: "S4".to_string(),
                allocation: 0.30,
                constituents: None,
            },
            PoolHolding {
                symbol: "ETF1".to_string(),
                allocation: 0.10,
                constituents: Some(constituents(&[("S1", 0.40), ("S2", 0.30), ("S3", 0.30)])),
            },
        ];
        let a_symbols: HashSet<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
        let pool = build_redemption_pool(&b_holdings, &a_symbols);
        // ETF1 is held by A directly, so it stays whole in the pool.
        assert!((pool["ETF1"] - 0.10).abs() < 1e-12);

        let baskets = analyze(&holdings, &pool);

        for level in [&baskets.basket_20, &baskets.basket_40, &baskets.basket_60] {
            let etf1 = level_fill(level, "ETF1");
            assert!((etf1.direct_fill - 0.10).abs() < 1e-12);
            assert!((etf1.coverage_weight - 0.70).abs() < 1e-12);
            assert!((etf1.redeemed_fill - 0.60).abs() < 1e-12);
            assert!((level_fill(level, "S4").direct_fill - 0.30).abs() < 1e-12);
            assert!((level.total_fill - 1.00).abs() < 1e-12);
        }
        for level in [&baskets.basket_80, &baskets.basket_100] {
            let etf1 = level_fill(level, "ETF1");
            assert_eq!(etf1.redeemed_fill, 0.0);
            assert!((level.total_fill - 0.40).abs() < 1e-12);
        }
    }

    // Two funds over the same single constituent: round-robin exhausts the
    // pool once; the second fund gets nothing.
    #[test]
    fn shared_constituent_is_redeemed_at_most_once() {
        let holdings = vec![
            fund("F1", 0.50, &[("X", 1.00)]),
            fund("F2", 0.50, &[("X", 1.00)]),
        ];
        let pool: HashMap<String, f64> = constituents(&[("X", 1.00)]);

        let baskets = analyze(&holdings, &pool);
        let level = &baskets.basket_20;
        let f1 = level_fill(level, "F1");
        let f2 = level_fill(level, "F2");

        assert!((f1.redeemed_fill + f2.redeemed_fill - 1.00).abs() < 1e-12);
        assert!(f1.redeemed_fill <= 1.00 && f2.redeemed_fill <= 1.00);
        assert!(level.total_fill <= 1.00 + 1e-12);
    }

    // A fund takes at most its own constituent weight of any pool symbol,
    // leaving the rest for later funds in the rotation.
    #[test]
    fn takes_are_capped_at_constituent_weights() {
        let holdings = vec![
            fund("ETF", 0.60, &[("A", 0.40), ("B", 0.30), ("C", 0.30)]),
            fund("ETF2", 0.40, &[("A", 1.00)]),
        ];
        let pool: HashMap<String, f64> = constituents(&[("A", 0.50), ("B", 0.50)]);

        let baskets = analyze(&holdings, &pool);

        let at_60 = &baskets.basket_60;
        assert!((level_fill(at_60, "ETF").coverage_weight - 0.70).abs() < 1e-12);
        assert!((level_fill(at_60, "ETF").redeemed_fill - 0.70).abs() < 1e-12);
        assert!((level_fill(at_60, "ETF2").redeemed_fill - 0.10).abs() < 1e-12);
        assert!((at_60.total_fill - 0.80).abs() < 1e-12);

        let at_80 = &baskets.basket_80;
        assert_eq!(level_fill(at_80, "ETF").redeemed_fill, 0.0);
        assert!((level_fill(at_80, "ETF2").redeemed_fill - 0.50).abs() < 1e-12);
        assert!((at_80.total_fill - 0.50).abs() < 1e-12);
    }

    #[test]
    fn total_fill_matches_the_sum_of_fills_at_every_level() {
        let holdings = vec![
            fund("F1", 0.30, &[("X", 0.50), ("Y", 0.50)]),
            fund("F2", 0.30, &[("Y", 1.00)]),
            stock("Z", 0.40),
        ];
        let pool: HashMap<String, f64> = constituents(&[("X", 0.20), ("Y", 0.40), ("Z", 0.40)]);

        let baskets = analyze(&holdings, &pool);
        for level in [
            &baskets.basket_20,
            &baskets.basket_40,
            &baskets.basket_60,
            &baskets.basket_80,
            &baskets.basket_100,
        ] {
            let sum: f64 = level
                .holdings
                .iter()
                .map(|h| h.direct_fill + h.redeemed_fill)
                .sum();
            assert!((level.total_fill - sum).abs() < 1e-12);
            assert!(level.total_fill <= 1.00 + 1e-9);
        }
    }

    #[test]
    fn fund_without_constituents_never_redeems() {
        let holdings = vec![BasketHolding {
            symbol: "MUT".to_string(),
            ideal_alloc: 1.0,
            constituents: None,
        }];
        let pool: HashMap<String, f64> = constituents(&[("X", 1.00)]);

        let baskets = analyze(&holdings, &pool);
        let fill = level_fill(&baskets.basket_20, "MUT");
        assert_eq!(fill.redeemed_fill, 0.0);
        assert_eq!(fill.coverage_weight, 0.0);
    }

    #[test]
    fn funds_in_b_not_held_by_a_are_flattened_into_the_pool() {
        let b_holdings = vec![PoolHolding {
            symbol: "VTI".to_string(),
            allocation: 0.50,
            constituents: Some(constituents(&[("AAPL", 0.60), ("MSFT", 0.40)])),
        }];
        let pool = build_redemption_pool(&b_holdings, &HashSet::new());

        assert!((pool["AAPL"] - 0.30).abs() < 1e-12);
        assert!((pool["MSFT"] - 0.20).abs() < 1e-12);
        assert!(!pool.contains_key("VTI"));
    }
}
