use std::collections::{BTreeMap, BTreeSet};

/// Opaque identifier for one good on auction
pub type Good = String;

/// A bundle of goods (deterministic iteration order matters for seeded runs)
pub type GoodSet = BTreeSet<Good>;

/// Mapping good -> non-negative amount; entries missing from the map read as 0
pub type BidVector = BTreeMap<Good, f64>;

/// Same shape as BidVector, holding per-good clearing or predicted prices
pub type PriceVector = BTreeMap<Good, f64>;

/// Identifier of a bidding agent, assigned by Vec index like campaign ids
pub type AgentId = usize;

/// Read an entry from a bid/price vector, defaulting missing goods to 0
pub fn vector_get(vector: &BTreeMap<Good, f64>, good: &str) -> f64 {
    vector.get(good).copied().unwrap_or(0.0)
}

/// Object-safe wrapper for a valuation function over bundles of goods.
///
/// A valuation must be pure and total on all subsets of the good universe
/// with v(empty) = 0; marginal-value estimation calls it many times per round
/// and relies on referential transparency. The blanket impl lets plain
/// closures be used wherever a `&dyn ValuationFn` is expected.
pub trait ValuationFn {
    fn value(&self, bundle: &GoodSet) -> f64;
}

impl<F: Fn(&GoodSet) -> f64> ValuationFn for F {
    fn value(&self, bundle: &GoodSet) -> f64 {
        self(bundle)
    }
}

/// Build a GoodSet from string literals (test and scenario convenience)
pub fn good_set(goods: &[&str]) -> GoodSet {
    goods.iter().map(|g| g.to_string()).collect()
}

/// Build a bid/price vector from (good, amount) pairs
pub fn vector_of(entries: &[(&str, f64)]) -> BTreeMap<Good, f64> {
    entries
        .iter()
        .map(|(g, amount)| (g.to_string(), *amount))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_get_defaults_to_zero() {
        let v = vector_of(&[("a", 3.0)]);
        assert_eq!(vector_get(&v, "a"), 3.0);
        assert_eq!(vector_get(&v, "missing"), 0.0);
    }

    #[test]
    fn test_closure_as_valuation() {
        let v = |bundle: &GoodSet| bundle.len() as f64 * 10.0;
        let vf: &dyn ValuationFn = &v;
        assert_eq!(vf.value(&good_set(&[])), 0.0);
        assert_eq!(vf.value(&good_set(&["a", "b"])), 20.0);
    }
}
