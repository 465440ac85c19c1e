use std::collections::{BTreeMap, HashMap};

// Overlap between two expanded weight vectors: the shared mass
// sum_s min(a[s], b[s]), clamped into [0, 1] to absorb float drift.
// Shared terms are summed in sorted-symbol order; float addition is not
// associative, so folding in either map's bucket order would let
// overlap_score(a, b) and overlap_score(b, a) round apart in the last bit.
// Symmetric bit-for-bit; exactly 1 for identical vectors.
pub fn overlap_score(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let shared: f64 = a
        .iter()
        .filter_map(|(symbol, &weight)| b.get(symbol).map(|&other| (symbol, weight.min(other))))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .sum();
    shared.clamp(0.0, 1.0)
}
