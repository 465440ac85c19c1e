use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityKind {
    CommonStock,
    Etf,
    MutualFund,
    Treasury,
}

impl SecurityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityKind::CommonStock => "common_stock",
            SecurityKind::Etf => "etf",
            SecurityKind::MutualFund => "mutual_fund",
            SecurityKind::Treasury => "treasury",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "common_stock" => Some(SecurityKind::CommonStock),
            "etf" => Some(SecurityKind::Etf),
            "mutual_fund" => Some(SecurityKind::MutualFund),
            "treasury" => Some(SecurityKind::Treasury),
            _ => None,
        }
    }

    /// ETFs and mutual funds both expand into constituents.
    pub fn is_fund(&self) -> bool {
        matches!(self, SecurityKind::Etf | SecurityKind::MutualFund)
    }
}

// A listed instrument. The symbol alone is not unique: foreign and ADR
// listings share symbols across exchanges, so lookups by symbol return a
// candidate set and the caller disambiguates.
#[derive(Debug, Clone, Serialize)]
pub struct Security {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub country: String,
    pub currency: String,
    pub inception_date: Option<NaiveDate>,
    pub kind: SecurityKind,
}

/// Pre-loaded view of the whole securities table, indexed both ways.
#[derive(Debug, Default)]
pub struct SecurityUniverse {
    by_id: HashMap<i64, Security>,
    by_symbol: HashMap<String, Vec<Security>>,
}

impl SecurityUniverse {
    pub fn new(all: Vec<Security>) -> Self {
        let mut by_id = HashMap::with_capacity(all.len());
        let mut by_symbol: HashMap<String, Vec<Security>> = HashMap::new();
        for sec in all {
            by_symbol
                .entry(sec.symbol.clone())
                .or_default()
                .push(sec.clone());
            by_id.insert(sec.id, sec);
        }
        Self { by_id, by_symbol }
    }

    pub fn get(&self, id: i64) -> Option<&Security> {
        self.by_id.get(&id)
    }

    /// All listings that share the symbol, in insertion order.
    pub fn candidates(&self, symbol: &str) -> &[Security] {
        self.by_symbol.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sec(id: i64, symbol: &str, exchange: &str) -> Security {
        Security {
            id,
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            exchange: exchange.to_string(),
            country: "USA".to_string(),
            currency: "USD".to_string(),
            inception_date: None,
            kind: SecurityKind::CommonStock,
        }
    }

    #[test]
    fn universe_keeps_all_listings_per_symbol() {
        let universe = SecurityUniverse::new(vec![
            sec(1, "BRK-B", "NYSE"),
            sec(2, "BRK-B", "LSE"),
            sec(3, "AAPL", "NASDAQ"),
        ]);

        assert_eq!(universe.candidates("BRK-B").len(), 2);
        assert_eq!(universe.candidates("AAPL").len(), 1);
        assert!(universe.candidates("MSFT").is_empty());
        assert_eq!(universe.get(3).unwrap().symbol, "AAPL");
    }

    #[test]
    fn kind_round_trips() {
        for kind in [
            SecurityKind::CommonStock,
            SecurityKind::Etf,
            SecurityKind::MutualFund,
            SecurityKind::Treasury,
        ] {
            assert_eq!(SecurityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SecurityKind::parse("crypto"), None);
    }
}
