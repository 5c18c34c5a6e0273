use rand::rngs::StdRng;

use crate::goods::{vector_get, BidVector, GoodSet, PriceVector, ValuationFn};
use crate::price_model::JointPriceModel;

/// Marginal value of selected_good for a bidder, given a provisional bid
/// vector and a point price vector.
///
/// The won set is every good whose bid meets its price; ties count as a win
/// (bid >= price), which is the estimation-side rule and load-bearing for
/// LocalBid. The result is v(W with the good) - v(W without it), well defined
/// whether or not the good is already in the won set.
pub fn marginal_value(
    goods: &GoodSet,
    selected_good: &str,
    valuation: &dyn ValuationFn,
    bids: &BidVector,
    prices: &PriceVector,
) -> f64 {
    let mut won_goods: GoodSet = goods
        .iter()
        .filter(|good| vector_get(bids, good) >= vector_get(prices, good))
        .cloned()
        .collect();

    won_goods.insert(selected_good.to_string());
    let value_with_good = valuation.value(&won_goods);

    won_goods.remove(selected_good);
    let value_without_good = valuation.value(&won_goods);

    value_with_good - value_without_good
}

/// Monte Carlo estimate of the expected marginal value of selected_good
/// under a price distribution.
///
/// For each of num_samples draws from the model, the won-set test covers only
/// the other goods and uses the strict clearing rule (bid > price); the
/// selected good's membership is forced synthetically rather than decided by
/// the sampled auction outcome.
pub fn expected_marginal_value(
    goods: &GoodSet,
    selected_good: &str,
    valuation: &dyn ValuationFn,
    bids: &BidVector,
    price_model: &JointPriceModel,
    num_samples: usize,
    rng: &mut StdRng,
) -> f64 {
    let mut total_mv = 0.0;

    for _ in 0..num_samples {
        let prices = price_model.sample(rng);

        let mut bundle: GoodSet = goods
            .iter()
            .filter(|good| {
                good.as_str() != selected_good
                    && vector_get(bids, good) > vector_get(&prices, good)
            })
            .cloned()
            .collect();

        bundle.insert(selected_good.to_string());
        let value_with_good = valuation.value(&bundle);
        bundle.remove(selected_good);
        let value_without_good = valuation.value(&bundle);

        total_mv += value_with_good - value_without_good;
    }

    total_mv / num_samples as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goods::{good_set, vector_of, GoodSet};
    use rand::SeedableRng;

    fn pair_valuation(bundle: &GoodSet) -> f64 {
        // Complement pair: a and b are worth far more together
        match (bundle.contains("a"), bundle.contains("b")) {
            (true, true) => 100.0,
            (true, false) => 90.0,
            (false, true) => 70.0,
            (false, false) => 0.0,
        }
    }

    #[test]
    fn test_marginal_value_from_empty_start() {
        // With all-zero bids and prices the won set is every good, but for a
        // single-good universe the value must reduce to v({g}) - v(empty)
        let goods = good_set(&["a"]);
        let bids = vector_of(&[]);
        let prices = vector_of(&[]);
        let mv = marginal_value(&goods, "a", &pair_valuation, &bids, &prices);
        assert_eq!(mv, 90.0);
    }

    #[test]
    fn test_marginal_value_against_won_bundle() {
        let goods = good_set(&["a", "b"]);
        let bids = vector_of(&[("a", 95.0), ("b", 90.0)]);
        let prices = vector_of(&[("a", 80.0), ("b", 80.0)]);
        // Both goods currently won; marginal value of "a" is v({a,b}) - v({b})
        let mv = marginal_value(&goods, "a", &pair_valuation, &bids, &prices);
        assert_eq!(mv, 30.0);
    }

    #[test]
    fn test_tie_counts_as_win() {
        let goods = good_set(&["a", "b"]);
        let bids = vector_of(&[("a", 0.0), ("b", 80.0)]);
        let prices = vector_of(&[("a", 50.0), ("b", 80.0)]);
        // b's bid equals its price, so b is in the won set
        let mv = marginal_value(&goods, "a", &pair_valuation, &bids, &prices);
        assert_eq!(mv, 100.0 - 70.0);
    }

    #[test]
    fn test_price_move_without_crossing_does_not_matter() {
        let goods = good_set(&["a", "b"]);
        let bids = vector_of(&[("a", 95.0), ("b", 90.0)]);
        let prices_low = vector_of(&[("a", 80.0), ("b", 10.0)]);
        let prices_high = vector_of(&[("a", 80.0), ("b", 89.0)]);
        // b's price moves but never crosses b's bid: marginal value of "a"
        // must not change
        let mv_low = marginal_value(&goods, "a", &pair_valuation, &bids, &prices_low);
        let mv_high = marginal_value(&goods, "a", &pair_valuation, &bids, &prices_high);
        assert_eq!(mv_low, mv_high);
    }

    #[test]
    fn test_expected_marginal_value_additive() {
        // For an additive valuation the bundle context is irrelevant, so the
        // Monte Carlo estimate must equal the per-good value exactly
        let additive = |bundle: &GoodSet| bundle.len() as f64 * 10.0;
        let goods = good_set(&["a", "b", "c"]);
        let model = crate::price_model::JointPriceModel::new(&goods, 5.0, 100.0);
        let bids = vector_of(&[]);
        let mut rng = StdRng::seed_from_u64(11);
        let emv = expected_marginal_value(&goods, "b", &additive, &bids, &model, 50, &mut rng);
        assert!((emv - 10.0).abs() < 1e-9);
    }
}
