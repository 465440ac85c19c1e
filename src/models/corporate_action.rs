use chrono::NaiveDate;

// A corporate-action event. Only split coefficients > 0 and != 1 take part
// in valuation; dividends are kept for completeness of the cached timeline.
#[derive(Debug, Clone)]
pub struct CorporateAction {
    pub security_id: i64,
    pub date: NaiveDate,
    pub split_coefficient: f64,
    pub dividend: f64,
}

impl CorporateAction {
    pub fn is_effective_split(&self) -> bool {
        self.split_coefficient > 0.0 && self.split_coefficient != 1.0
    }
}
