use crate::models::Security;

// MSCI-aligned developed markets. Anything off this list counts as
// emerging/frontier for listing selection.
const DEVELOPED_MARKETS: &[&str] = &[
    "USA",
    "Canada",
    "United Kingdom",
    "Ireland",
    "Germany",
    "France",
    "Italy",
    "Spain",
    "Portugal",
    "Netherlands",
    "Belgium",
    "Austria",
    "Switzerland",
    "Denmark",
    "Finland",
    "Norway",
    "Sweden",
    "Japan",
    "Australia",
    "New Zealand",
    "Hong Kong",
    "Singapore",
    "Israel",
];

const US_INDEX_KEYWORDS: &[&str] = &["S&P 500", "S&P500", "NASDAQ", "RUSSELL"];

const EX_US_KEYWORDS: &[&str] = &["EX-US", "EX US", "EX UNITED STATES", "INTERNATIONAL"];

const EMERGING_KEYWORDS: &[&str] = &[
    "EMERGING",
    "FRONTIER",
    "CHINA",
    "INDIA",
    "BRAZIL",
    "TAIWAN",
    "KOREA",
    "VIETNAM",
    "INDONESIA",
    "MEXICO",
    "LATIN AMERICA",
    "AFRICA",
];

pub fn is_developed_market(country: &str) -> bool {
    DEVELOPED_MARKETS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(country))
}

fn name_contains_any(name: &str, keywords: &[&str]) -> bool {
    let upper = name.to_uppercase();
    keywords.iter().any(|k| upper.contains(k))
}

/// How a fund's own profile biases listing selection for its constituents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionBias {
    /// The fund tracks a US index; constituents are US listings, full stop.
    UsIndex,
    /// Non-US fund with emerging-market flavor.
    Emerging,
    /// Non-US fund without emerging keywords (the ex-US ETF default).
    DevelopedExUs,
    /// Plain US fund.
    Us,
}

pub fn classify_fund(fund_name: &str, fund_currency: &str) -> RegionBias {
    if name_contains_any(fund_name, US_INDEX_KEYWORDS) {
        return RegionBias::UsIndex;
    }
    let non_us = !fund_currency.eq_ignore_ascii_case("USD")
        || name_contains_any(fund_name, EX_US_KEYWORDS)
        || name_contains_any(fund_name, EMERGING_KEYWORDS);
    if non_us {
        if name_contains_any(fund_name, EMERGING_KEYWORDS) {
            return RegionBias::Emerging;
        }
        return RegionBias::DevelopedExUs;
    }
    RegionBias::Us
}

// Pick one listing of an ambiguous symbol, keyed to the fund being resolved.
// Returning None drops the holding; the caller records the warning.
pub fn select_listing<'a>(
    fund_name: &str,
    fund_currency: &str,
    candidates: &'a [Security],
) -> Option<&'a Security> {
    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(&candidates[0]);
    }

    match classify_fund(fund_name, fund_currency) {
        RegionBias::UsIndex => pick_us(candidates),
        RegionBias::Emerging => candidates
            .iter()
            .find(|c| !is_developed_market(&c.country))
            .or_else(|| first_developed_non_us(candidates))
            .or_else(|| candidates.iter().find(|c| c.country != "USA"))
            .or_else(|| candidates.iter().find(|c| c.country == "USA")),
        RegionBias::DevelopedExUs => {
            first_developed_non_us(candidates).or_else(|| candidates.iter().find(|c| c.country == "USA"))
        }
        RegionBias::Us => {
            if let Some(us) = candidates.iter().find(|c| c.country == "USA") {
                return Some(us);
            }
            let mut usd = candidates.iter().filter(|c| c.currency == "USD");
            match (usd.next(), usd.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        }
    }
}

fn first_developed_non_us<'a>(candidates: &'a [Security]) -> Option<&'a Security> {
    candidates
        .iter()
        .find(|c| c.country != "USA" && is_developed_market(&c.country))
}

fn pick_us<'a>(candidates: &'a [Security]) -> Option<&'a Security> {
    let us: Vec<&Security> = candidates.iter().filter(|c| c.country == "USA").collect();
    match us.len() {
        0 => None,
        1 => Some(us[0]),
        _ => {
            let usd: Vec<&&Security> = us.iter().filter(|c| c.currency == "USD").collect();
            if usd.len() == 1 {
                Some(usd[0])
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SecurityKind;

    fn listing(id: i64, country: &str, currency: &str) -> Security {
        Security {
            id,
            symbol: "XYZ".to_string(),
            name: "Xyz Corp".to_string(),
            exchange: "X".to_string(),
            country: country.to_string(),
            currency: currency.to_string(),
            inception_date: None,
            kind: SecurityKind::CommonStock,
        }
    }

    #[test]
    fn us_index_fund_picks_us_even_when_fund_is_foreign_denominated() {
        let candidates = vec![listing(1, "United Kingdom", "GBP"), listing(2, "USA", "USD")];
        let picked = select_listing("iShares Core S&P 500 UCITS", "GBP", &candidates).unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn us_index_fund_with_ambiguous_us_listings_returns_none() {
        let candidates = vec![listing(1, "USA", "USD"), listing(2, "USA", "USD")];
        assert!(select_listing("Vanguard S&P 500", "USD", &candidates).is_none());
    }

    #[test]
    fn emerging_fund_prefers_emerging_listing() {
        let candidates = vec![
            listing(1, "USA", "USD"),
            listing(2, "Japan", "JPY"),
            listing(3, "Taiwan", "TWD"),
        ];
        let picked = select_listing("Schwab Emerging Markets Equity", "USD", &candidates).unwrap();
        assert_eq!(picked.id, 3);
    }

    #[test]
    fn emerging_fund_falls_back_to_developed_non_us() {
        let candidates = vec![listing(1, "USA", "USD"), listing(2, "Japan", "JPY")];
        let picked = select_listing("Frontier Markets Fund", "USD", &candidates).unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn ex_us_fund_prefers_developed_non_us_listing() {
        let candidates = vec![listing(1, "USA", "USD"), listing(2, "Germany", "EUR")];
        let picked = select_listing("Total International Stock", "USD", &candidates).unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn ex_us_fund_falls_back_to_usa_when_no_foreign_listing_exists() {
        let candidates = vec![listing(1, "USA", "USD"), listing(2, "USA", "CAD")];
        let picked = select_listing("Developed Markets ex-US", "USD", &candidates).unwrap();
        assert_eq!(picked.country, "USA");
    }

    #[test]
    fn plain_us_fund_picks_usa_listing() {
        let candidates = vec![listing(1, "United Kingdom", "GBP"), listing(2, "USA", "USD")];
        let picked = select_listing("Total Stock Market", "USD", &candidates).unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn plain_us_fund_accepts_single_usd_listing_when_no_usa_exists() {
        let candidates = vec![listing(1, "Bermuda", "USD"), listing(2, "Japan", "JPY")];
        let picked = select_listing("Total Stock Market", "USD", &candidates).unwrap();
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn plain_us_fund_with_multiple_usd_listings_and_no_usa_returns_none() {
        let candidates = vec![listing(1, "Bermuda", "USD"), listing(2, "Panama", "USD")];
        assert!(select_listing("Total Stock Market", "USD", &candidates).is_none());
    }

    #[test]
    fn single_candidate_short_circuits() {
        let candidates = vec![listing(1, "France", "EUR")];
        let picked = select_listing("Anything At All", "USD", &candidates).unwrap();
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn classifier_flags() {
        assert_eq!(classify_fund("S&P 500 Index", "USD"), RegionBias::UsIndex);
        assert_eq!(
            classify_fund("Emerging Markets ex-US", "USD"),
            RegionBias::Emerging
        );
        assert_eq!(
            classify_fund("International Developed", "USD"),
            RegionBias::DevelopedExUs
        );
        // A non-USD denomination alone flags the fund as non-US.
        assert_eq!(classify_fund("Global Leaders", "EUR"), RegionBias::DevelopedExUs);
        assert_eq!(classify_fund("Large Cap Growth", "USD"), RegionBias::Us);
    }
}
