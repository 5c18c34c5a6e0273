use rand::rngs::StdRng;

use crate::goods::{BidVector, GoodSet, PriceVector, ValuationFn};
use crate::marginal::{expected_marginal_value, marginal_value};
use crate::price_model::JointPriceModel;

/// Iterative local best-response bid optimizer.
///
/// Starting from all-zero bids, each iteration recomputes every good's bid as
/// its (expected) marginal value against the same starting vector - a
/// synchronous Jacobi update, so the result is independent of good order.
/// Iteration stops when the largest per-good change falls below epsilon or
/// after num_iterations rounds, whichever comes first.
///
/// There is no convergence guarantee: complement or substitute valuations can
/// cycle, and the iteration cap is the real termination contract. Callers
/// must not assume the returned vector is a fixed point.
pub struct LocalBidOptimizer {
    pub num_iterations: usize,
    pub num_samples: usize,
    pub epsilon: f64,
}

impl LocalBidOptimizer {
    /// Create an optimizer with the standard hyperparameters
    pub fn new() -> Self {
        Self {
            num_iterations: 100,
            num_samples: 50,
            epsilon: 0.01,
        }
    }

    /// Create an optimizer with custom hyperparameters
    ///
    /// # Arguments
    /// * `num_iterations` - Iteration cap (termination contract)
    /// * `num_samples` - Monte Carlo draws per expected-marginal-value estimate
    /// * `epsilon` - Early-stop threshold on the largest per-good bid change
    pub fn new_advanced(num_iterations: usize, num_samples: usize, epsilon: f64) -> Self {
        Self {
            num_iterations,
            num_samples,
            epsilon,
        }
    }

    /// Run the fixed-point iteration against a point price vector
    pub fn optimize(
        &self,
        goods: &GoodSet,
        valuation: &dyn ValuationFn,
        prices: &PriceVector,
    ) -> BidVector {
        let mut bids = zero_bids(goods);

        for _ in 0..self.num_iterations {
            // Jacobi update: every good is re-estimated from the same
            // starting vector, so update order cannot matter
            let new_bids: BidVector = goods
                .iter()
                .map(|good| {
                    (
                        good.clone(),
                        marginal_value(goods, good, valuation, &bids, prices),
                    )
                })
                .collect();

            let max_change = max_change(goods, &bids, &new_bids);
            bids = new_bids;
            if max_change < self.epsilon {
                break;
            }
        }

        bids
    }

    /// Run the fixed-point iteration against a price distribution, estimating
    /// each bid as an expected marginal value over num_samples draws
    pub fn optimize_expected(
        &self,
        goods: &GoodSet,
        valuation: &dyn ValuationFn,
        price_model: &JointPriceModel,
        rng: &mut StdRng,
    ) -> BidVector {
        let mut bids = zero_bids(goods);

        for _ in 0..self.num_iterations {
            let new_bids: BidVector = goods
                .iter()
                .map(|good| {
                    (
                        good.clone(),
                        expected_marginal_value(
                            goods,
                            good,
                            valuation,
                            &bids,
                            price_model,
                            self.num_samples,
                            rng,
                        ),
                    )
                })
                .collect();

            let max_change = max_change(goods, &bids, &new_bids);
            bids = new_bids;
            if max_change < self.epsilon {
                break;
            }
        }

        bids
    }
}

impl Default for LocalBidOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

fn zero_bids(goods: &GoodSet) -> BidVector {
    goods.iter().map(|good| (good.clone(), 0.0)).collect()
}

fn max_change(goods: &GoodSet, bids: &BidVector, new_bids: &BidVector) -> f64 {
    goods
        .iter()
        .map(|good| (new_bids[good] - bids[good]).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goods::{good_set, vector_of, GoodSet};
    use rand::SeedableRng;

    fn additive(bundle: &GoodSet) -> f64 {
        bundle
            .iter()
            .map(|good| match good.as_str() {
                "a" => 20.0,
                "b" => 25.0,
                "c" => 30.0,
                _ => 0.0,
            })
            .sum()
    }

    #[test]
    fn test_additive_converges_to_per_good_values() {
        let goods = good_set(&["a", "b", "c"]);
        let optimizer = LocalBidOptimizer::new();
        let bids = optimizer.optimize(&goods, &additive, &vector_of(&[]));
        assert!((bids["a"] - 20.0).abs() < 0.01);
        assert!((bids["b"] - 25.0).abs() < 0.01);
        assert!((bids["c"] - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_expected_variant_with_fresh_model() {
        // A fresh model samples uniformly over [0, 100); the additive
        // valuation makes the bundle context irrelevant so bids still equal
        // the per-good values
        let goods = good_set(&["a", "b", "c"]);
        let model = JointPriceModel::new(&goods, 5.0, 100.0);
        let optimizer = LocalBidOptimizer::new();
        let mut rng = StdRng::seed_from_u64(13);
        let bids = optimizer.optimize_expected(&goods, &additive, &model, &mut rng);
        assert!((bids["a"] - 20.0).abs() < 0.01);
        assert!((bids["c"] - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_substitutes_terminate_at_iteration_cap() {
        // Perfect substitutes oscillate between both-in and both-out; the
        // optimizer must still terminate and return the last vector
        let substitutes = |bundle: &GoodSet| if bundle.is_empty() { 0.0 } else { 50.0 };
        let goods = good_set(&["a", "b"]);
        let optimizer = LocalBidOptimizer::new_advanced(10, 50, 0.01);
        let prices = vector_of(&[("a", 40.0), ("b", 40.0)]);
        let bids = optimizer.optimize(&goods, &substitutes, &prices);
        assert_eq!(bids.len(), 2);
        for bid in bids.values() {
            assert!(bid.is_finite());
        }
    }
}
