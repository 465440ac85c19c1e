use chrono::NaiveDate;

/// One day of the reference-tenor (10-year) treasury series, as an
/// annualized percent rate.
#[derive(Debug, Clone, Copy)]
pub struct YieldPoint {
    pub date: NaiveDate,
    pub rate: f64,
}
