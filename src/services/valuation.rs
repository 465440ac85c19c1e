use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::DailyValue;

/// Seed dollar value for an ideal portfolio's series; constant per response
/// so ideal and active values stay dollar-comparable.
pub const IDEAL_SEED_VALUE: f64 = 10_000.0;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

// Loaded market data for one security over the valuation window: dense
// daily closes plus the split timeline.
#[derive(Debug, Clone, Default)]
pub struct SecuritySeries {
    pub closes: BTreeMap<NaiveDate, f64>,
    pub splits: Vec<(NaiveDate, f64)>,
}

/// One position to value: a share count or a target weight over a series.
#[derive(Debug, Clone)]
pub struct ValuedPosition {
    pub quantity: f64,
    pub series: SecuritySeries,
}

// Cumulative split factor on a given day: the product of coefficients of
// splits effective on or before that day. Share counts are anchored at the
// window start, so multiplying by this factor keeps value continuous across
// a split (pre-split shares x pre-split close == post-split shares x
// post-split close).
pub fn split_factor(splits: &[(NaiveDate, f64)], on: NaiveDate) -> f64 {
    splits
        .iter()
        .filter(|(date, coefficient)| *date <= on && *coefficient > 0.0 && *coefficient != 1.0)
        .map(|(_, coefficient)| coefficient)
        .product()
}

/// The most recent observed close on or before `on` (carry-forward on gap
/// days), if the security has traded at all by then.
pub fn close_on(series: &SecuritySeries, on: NaiveDate) -> Option<f64> {
    series.closes.range(..=on).next_back().map(|(_, &close)| close)
}

/// Split-adjusted market value of a share position on a day.
pub fn market_value_on(shares: f64, series: &SecuritySeries, on: NaiveDate) -> Option<f64> {
    close_on(series, on).map(|close| shares * split_factor(&series.splits, on) * close)
}

// Trading days for a set of positions: the union of observed price dates in
// the window, starting no earlier than the latest first observation so every
// position has a (possibly carried) close on every reported day.
fn trading_days(positions: &[ValuedPosition], start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut first_observed: Option<NaiveDate> = None;
    for position in positions {
        match position.series.closes.keys().next() {
            Some(&first) => {
                first_observed = Some(first_observed.map_or(first, |latest| latest.max(first)));
            }
            None => return Vec::new(),
        }
    }
    let Some(all_observed) = first_observed else {
        return Vec::new();
    };
    let floor = all_observed.max(start);

    let days: BTreeSet<NaiveDate> = positions
        .iter()
        .flat_map(|p| p.series.closes.range(floor..=end).map(|(&d, _)| d))
        .collect();
    days.into_iter().collect()
}

/// Daily value series for an active portfolio (share counts).
pub fn daily_values_active(
    positions: &[ValuedPosition],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailyValue> {
    trading_days(positions, start, end)
        .into_iter()
        .map(|date| {
            let value = positions
                .iter()
                .filter_map(|p| market_value_on(p.quantity, &p.series, date))
                .sum();
            DailyValue { date, value }
        })
        .collect()
}

// Daily value series for an ideal portfolio (weights). The seed evolves by
// split-adjusted close ratios relative to the first reported day.
pub fn daily_values_ideal(
    positions: &[ValuedPosition],
    start: NaiveDate,
    end: NaiveDate,
    seed: f64,
) -> Vec<DailyValue> {
    let days = trading_days(positions, start, end);
    let Some(&first_day) = days.first() else {
        return Vec::new();
    };

    let base: Vec<Option<f64>> = positions
        .iter()
        .map(|p| {
            close_on(&p.series, first_day)
                .map(|close| close * split_factor(&p.series.splits, first_day))
                .filter(|&c| c > 0.0)
        })
        .collect();

    days.into_iter()
        .map(|date| {
            let growth: f64 = positions
                .iter()
                .zip(base.iter())
                .filter_map(|(p, base_close)| {
                    let base_close = (*base_close)?;
                    let close = close_on(&p.series, date)?;
                    Some(p.quantity * close * split_factor(&p.series.splits, date) / base_close)
                })
                .sum();
            DailyValue {
                date,
                value: seed * growth,
            }
        })
        .collect()
}

/// Start/end values, dollar gain and fractional gain of a value series.
/// A zero or empty start reports 0 gain rather than NaN.
pub fn performance_summary(values: &[DailyValue]) -> (f64, f64, f64, f64) {
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return (0.0, 0.0, 0.0, 0.0);
    };
    let gain_dollar = last.value - first.value;
    let gain_percent = if first.value > 0.0 {
        gain_dollar / first.value
    } else {
        0.0
    };
    (first.value, last.value, gain_dollar, gain_percent)
}

// Annualized Sharpe-style score over daily excess returns. Yields are
// annualized percents; the per-trading-day risk-free rate is y/100/252.
// Degenerate series (fewer than two returns, zero variance, non-finite
// intermediate values) report 0.0 rather than NaN.
pub fn sharpe_ratio(values: &[DailyValue], yields: &BTreeMap<NaiveDate, f64>) -> f64 {
    let excess: Vec<f64> = values
        .windows(2)
        .filter(|pair| pair[0].value > 0.0)
        .map(|pair| {
            let daily_return = pair[1].value / pair[0].value - 1.0;
            let rate = yields.get(&pair[1].date).copied().unwrap_or(0.0);
            daily_return - rate / 100.0 / TRADING_DAYS_PER_YEAR
        })
        .collect();
    if excess.len() < 2 {
        return 0.0;
    }

    let n = excess.len() as f64;
    let mean = excess.iter().sum::<f64>() / n;
    let variance = excess.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stdev = variance.sqrt();
    if stdev == 0.0 {
        return 0.0;
    }

    let score = mean / stdev * TRADING_DAYS_PER_YEAR.sqrt();
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(closes: &[(&str, f64)], splits: &[(&str, f64)]) -> SecuritySeries {
        SecuritySeries {
            closes: closes.iter().map(|(d, c)| (date(d), *c)).collect(),
            splits: splits.iter().map(|(d, c)| (date(d), *c)).collect(),
        }
    }

    // A 2-for-1 split halves the close; the adjusted share count doubles and
    // the portfolio value stays flat through the event.
    #[test]
    fn split_continuity_for_active_portfolio() {
        let x = series(
            &[
                ("2025-01-06", 200.0),
                ("2025-01-07", 200.0),
                ("2025-01-08", 200.0),
                ("2025-01-09", 200.0),
                ("2025-01-10", 200.0),
                ("2025-01-13", 100.0),
                ("2025-01-14", 100.0),
                ("2025-01-15", 100.0),
                ("2025-01-16", 100.0),
                ("2025-01-17", 100.0),
            ],
            &[("2025-01-13", 2.0)],
        );
        let positions = vec![ValuedPosition {
            quantity: 10.0,
            series: x,
        }];

        let values = daily_values_active(&positions, date("2025-01-06"), date("2025-01-17"));

        assert_eq!(values.len(), 10);
        let on = |d: &str| values.iter().find(|v| v.date == date(d)).unwrap().value;
        assert_eq!(on("2025-01-10"), 2000.0);
        assert_eq!(on("2025-01-13"), 2000.0);

        let (start, end, gain_dollar, gain_percent) = performance_summary(&values);
        assert_eq!(start, 2000.0);
        assert_eq!(end, 2000.0);
        assert_eq!(gain_dollar, 0.0);
        assert_eq!(gain_percent, 0.0);
    }

    #[test]
    fn ideal_portfolio_evolves_the_seed_by_close_ratios() {
        let a = series(&[("2025-02-03", 100.0), ("2025-02-04", 110.0)], &[]);
        let b = series(&[("2025-02-03", 50.0), ("2025-02-04", 45.0)], &[]);
        let positions = vec![
            ValuedPosition { quantity: 0.6, series: a },
            ValuedPosition { quantity: 0.4, series: b },
        ];

        let values =
            daily_values_ideal(&positions, date("2025-02-03"), date("2025-02-04"), IDEAL_SEED_VALUE);

        assert_eq!(values[0].value, IDEAL_SEED_VALUE);
        // 0.6 * 1.10 + 0.4 * 0.90 = 1.02
        assert!((values[1].value - IDEAL_SEED_VALUE * 1.02).abs() < 1e-9);
    }

    #[test]
    fn ideal_values_are_continuous_across_a_split() {
        let x = series(
            &[("2025-01-10", 200.0), ("2025-01-13", 100.0), ("2025-01-14", 101.0)],
            &[("2025-01-13", 2.0)],
        );
        let positions = vec![ValuedPosition { quantity: 1.0, series: x }];

        let values = daily_values_ideal(&positions, date("2025-01-10"), date("2025-01-14"), 1000.0);

        assert!((values[0].value - 1000.0).abs() < 1e-9);
        assert!((values[1].value - 1000.0).abs() < 1e-9);
        assert!((values[2].value - 1010.0).abs() < 1e-9);
    }

    #[test]
    fn gap_days_carry_the_most_recent_close_forward() {
        let a = series(&[("2025-03-03", 10.0), ("2025-03-04", 12.0), ("2025-03-05", 12.0)], &[]);
        // b is missing 03-04.
        let b = series(&[("2025-03-03", 20.0), ("2025-03-05", 24.0)], &[]);
        let positions = vec![
            ValuedPosition { quantity: 1.0, series: a },
            ValuedPosition { quantity: 1.0, series: b },
        ];

        let values = daily_values_active(&positions, date("2025-03-03"), date("2025-03-05"));

        assert_eq!(values.len(), 3);
        // 03-04 uses b's carried close of 20.
        assert_eq!(values[1].value, 32.0);
        assert_eq!(values[2].value, 36.0);
    }

    #[test]
    fn days_before_every_position_has_traded_are_omitted() {
        let a = series(&[("2025-03-03", 10.0), ("2025-03-04", 10.0)], &[]);
        let late = series(&[("2025-03-04", 5.0)], &[]);
        let positions = vec![
            ValuedPosition { quantity: 1.0, series: a },
            ValuedPosition { quantity: 1.0, series: late },
        ];

        let values = daily_values_active(&positions, date("2025-03-03"), date("2025-03-04"));

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].date, date("2025-03-04"));
    }

    #[test]
    fn empty_positions_produce_an_empty_series() {
        assert!(daily_values_active(&[], date("2025-01-01"), date("2025-12-31")).is_empty());
        let no_data = vec![ValuedPosition {
            quantity: 1.0,
            series: SecuritySeries::default(),
        }];
        assert!(daily_values_active(&no_data, date("2025-01-01"), date("2025-12-31")).is_empty());
    }

    #[test]
    fn sharpe_of_constant_excess_returns_is_the_zero_sentinel() {
        let values: Vec<DailyValue> = (0..5)
            .map(|i| DailyValue {
                date: date("2025-01-06") + chrono::Duration::days(i),
                value: 100.0 * 1.01_f64.powi(i as i32),
            })
            .collect();
        assert_eq!(sharpe_ratio(&values, &BTreeMap::new()), 0.0);
    }

    #[test]
    fn sharpe_matches_a_hand_computed_series() {
        let values = vec![
            DailyValue { date: date("2025-01-06"), value: 100.0 },
            DailyValue { date: date("2025-01-07"), value: 101.0 },
            DailyValue { date: date("2025-01-08"), value: 104.03 },
        ];
        // Returns are 1% and 3%; zero risk-free rate.
        let r1: f64 = 0.01;
        let r2 = 104.03 / 101.0 - 1.0;
        let mean = (r1 + r2) / 2.0;
        let stdev = (((r1 - mean).powi(2) + (r2 - mean).powi(2)) / 1.0).sqrt();
        let expected = mean / stdev * TRADING_DAYS_PER_YEAR.sqrt();

        let got = sharpe_ratio(&values, &BTreeMap::new());
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn sharpe_subtracts_the_daily_risk_free_rate() {
        let values = vec![
            DailyValue { date: date("2025-01-06"), value: 100.0 },
            DailyValue { date: date("2025-01-07"), value: 101.0 },
            DailyValue { date: date("2025-01-08"), value: 101.0 },
        ];
        let mut yields = BTreeMap::new();
        yields.insert(date("2025-01-07"), 4.2);
        yields.insert(date("2025-01-08"), 4.2);

        let daily_rf = 4.2 / 100.0 / TRADING_DAYS_PER_YEAR;
        let r1 = 0.01 - daily_rf;
        let r2 = 0.0 - daily_rf;
        let mean = (r1 + r2) / 2.0;
        let stdev = (((r1 - mean).powi(2) + (r2 - mean).powi(2)) / 1.0).sqrt();
        let expected = mean / stdev * TRADING_DAYS_PER_YEAR.sqrt();

        let got = sharpe_ratio(&values, &yields);
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn single_point_series_reports_zero_everything() {
        let values = vec![DailyValue { date: date("2025-01-06"), value: 100.0 }];
        let (start, end, gain, pct) = performance_summary(&values);
        assert_eq!((start, end, gain, pct), (100.0, 100.0, 0.0, 0.0));
        assert_eq!(sharpe_ratio(&values, &BTreeMap::new()), 0.0);
    }
}
