use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{FundConstituent, RawConstituent, Security, SecurityUniverse};
use crate::services::listing::select_listing;
use crate::services::warnings::{WarningCode, Warnings};

/// Tolerance on a resolved weight sum before normalization kicks in.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-4;

// Provider files mark "no exchange symbol" lines (swaps, cash) with one of
// these sentinels when the column is not simply empty.
const NO_SYMBOL_SENTINELS: &[&str] = &["N/A", "-", "--"];

fn is_placeholder_symbol(symbol: &str) -> bool {
    let trimmed = symbol.trim();
    trimmed.is_empty() || NO_SYMBOL_SENTINELS.iter().any(|s| trimmed.eq_ignore_ascii_case(s))
}

fn class_qualifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:INC-|-)?\s*CL(?:ASS)?\s+A\b").unwrap())
}

fn collapse_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Z0-9]+").unwrap())
}

// Canonical name key used to merge swap placeholders into their underlying
// equity line: uppercase, trailing SWAP / SWAP GS stripped, class qualifiers
// and .COM removed, punctuation and whitespace collapsed.
pub fn canonical_name(name: &str) -> String {
    let mut key = name.trim().to_uppercase();
    for suffix in ["SWAP GS", "SWAP"] {
        if let Some(stripped) = key.strip_suffix(suffix) {
            key = stripped.trim_end().to_string();
        }
    }
    key = class_qualifier_re().replace_all(&key, " ").to_string();
    key = key.replace(".COM", " ");
    collapse_re().replace_all(&key, " ").trim().to_string()
}

// Symbol spelling variants tried, in order, when the raw symbol is unknown:
// dot->dash (BRK.B -> BRK-B), dash->dot, all punctuation stripped (BRKB).
pub fn resolve_symbol_variant(symbol: &str, universe: &SecurityUniverse) -> Option<String> {
    if universe.contains_symbol(symbol) {
        return Some(symbol.to_string());
    }
    let variants = [
        symbol.replace('.', "-"),
        symbol.replace('-', "."),
        symbol.replace(['.', '-'], ""),
    ];
    variants
        .into_iter()
        .find(|candidate| candidate != symbol && universe.contains_symbol(candidate))
}

/// Resolve a raw fund constituent list into a clean security -> weight list
/// whose weights sum to 1. Non-fatal issues accumulate on the channel.
pub fn resolve_constituents(
    fund_symbol: &str,
    fund_name: &str,
    fund_currency: &str,
    raw: Vec<RawConstituent>,
    universe: &SecurityUniverse,
    warnings: &Warnings,
) -> Vec<FundConstituent> {
    // Partition into real holdings, mergeable placeholders, and dead lines.
    let mut real: Vec<RawConstituent> = Vec::new();
    let mut placeholders: Vec<RawConstituent> = Vec::new();
    for line in raw {
        if is_placeholder_symbol(&line.symbol) {
            placeholders.push(line);
        } else if line.weight > 0.0 {
            real.push(line);
        } else {
            warnings.push(
                WarningCode::UnresolvedFundHolding,
                format!(
                    "{}: holding '{}' ({}) has non-positive weight {:.4} and was dropped",
                    fund_symbol, line.name, line.symbol, line.weight
                ),
            );
        }
    }

    // Swap merging: a placeholder whose canonical name matches exactly one
    // real holding folds its weight into that holding.
    let mut by_canonical: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, line) in real.iter().enumerate() {
        by_canonical.entry(canonical_name(&line.name)).or_default().push(idx);
    }
    for placeholder in placeholders {
        let merged = placeholder.weight > 0.0
            && match by_canonical.get(&canonical_name(&placeholder.name)) {
                Some(indices) if indices.len() == 1 => {
                    real[indices[0]].weight += placeholder.weight;
                    true
                }
                _ => false,
            };
        if !merged {
            warnings.push(
                WarningCode::UnresolvedFundHolding,
                format!(
                    "{}: could not resolve placeholder '{}' (weight {:.4})",
                    fund_symbol, placeholder.name, placeholder.weight
                ),
            );
        }
    }

    // Variant resolution + listing disambiguation + unknown filtering.
    // Two raw lines may land on the same security; their weights combine.
    let mut order: Vec<i64> = Vec::new();
    let mut resolved: HashMap<i64, FundConstituent> = HashMap::new();
    for line in real {
        let symbol = match resolve_symbol_variant(&line.symbol, universe) {
            Some(symbol) => symbol,
            None => {
                warnings.push(
                    WarningCode::UnresolvedFundHolding,
                    format!(
                        "{}: unknown symbol '{}' ({}) was dropped",
                        fund_symbol, line.symbol, line.name
                    ),
                );
                continue;
            }
        };
        let security = match select_listing(fund_name, fund_currency, universe.candidates(&symbol)) {
            Some(security) => security,
            None => {
                warnings.push(
                    WarningCode::UnresolvedFundHolding,
                    format!(
                        "{}: no unambiguous listing for '{}' ({})",
                        fund_symbol, symbol, line.name
                    ),
                );
                continue;
            }
        };
        match resolved.get_mut(&security.id) {
            Some(existing) => existing.weight += line.weight,
            None => {
                order.push(security.id);
                resolved.insert(
                    security.id,
                    FundConstituent {
                        security_id: security.id,
                        symbol: security.symbol.clone(),
                        weight: line.weight,
                    },
                );
            }
        }
    }

    let mut constituents: Vec<FundConstituent> = order
        .into_iter()
        .filter_map(|id| resolved.remove(&id))
        .filter(|c| c.weight > 0.0)
        .collect();

    // Normalize the survivors to sum to 1.
    let sum: f64 = constituents.iter().map(|c| c.weight).sum();
    if sum > 0.0 && (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
        for c in &mut constituents {
            c.weight /= sum;
        }
        warnings.push(
            WarningCode::PartialFundExpansion,
            format!(
                "{}: resolved constituent weights summed to {:.4}; rescaled to 1",
                fund_symbol, sum
            ),
        );
    }
    if sum <= 0.0 {
        constituents.clear();
    }

    constituents
}
