use std::collections::BTreeMap;

use rand::rngs::StdRng;

use crate::goods::{vector_get, Good, GoodSet, PriceVector};
use crate::histogram::PriceHistogram;

/// Per-good-independent product of price histograms over a good universe.
///
/// Models each good's clearing price with its own PriceHistogram under an
/// explicit independence assumption: no cross-good correlation is learned or
/// sampled. Like the single histograms it is exclusively owned by one
/// learning agent.
#[derive(Debug, Clone)]
pub struct JointPriceModel {
    histograms: BTreeMap<Good, PriceHistogram>,
}

impl JointPriceModel {
    /// Create one histogram per good, all sharing the same geometry
    pub fn new(goods: &GoodSet, bucket_size: f64, upper_bound: f64) -> Self {
        let histograms = goods
            .iter()
            .map(|good| (good.clone(), PriceHistogram::new(bucket_size, upper_bound)))
            .collect();
        Self { histograms }
    }

    /// Record one observed price vector, routing each component to its
    /// good's histogram. Goods missing from the vector read as price 0;
    /// vector entries for goods outside the model are ignored.
    pub fn add_record(&mut self, prices: &PriceVector) {
        for (good, histogram) in &mut self.histograms {
            histogram.add_record(vector_get(prices, good));
        }
    }

    /// Bucket-wise EMA update of every good's histogram from the matching
    /// histogram in new_model (see PriceHistogram::blend_update)
    pub fn blend_update(&mut self, new_model: &JointPriceModel, alpha: f64) {
        for (good, histogram) in &mut self.histograms {
            if let Some(new_hist) = new_model.histograms.get(good) {
                histogram.blend_update(new_hist, alpha);
            }
        }
    }

    /// Draw a full price vector by sampling every good independently
    pub fn sample(&self, rng: &mut StdRng) -> PriceVector {
        self.histograms
            .iter()
            .map(|(good, histogram)| (good.clone(), histogram.sample(rng)))
            .collect()
    }

    pub fn histogram(&self, good: &str) -> Option<&PriceHistogram> {
        self.histograms.get(good)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goods::{good_set, vector_of};
    use rand::SeedableRng;

    #[test]
    fn test_add_record_routes_components() {
        let goods = good_set(&["a", "b"]);
        let mut model = JointPriceModel::new(&goods, 5.0, 100.0);
        model.add_record(&vector_of(&[("a", 12.0)]));
        // "a" got a record at 12.0, "b" got the default 0.0
        assert_eq!(model.histogram("a").unwrap().total(), 21.0);
        assert_eq!(model.histogram("b").unwrap().total(), 21.0);
    }

    #[test]
    fn test_sample_covers_all_goods() {
        let goods = good_set(&["a", "b", "c"]);
        let model = JointPriceModel::new(&goods, 5.0, 100.0);
        let mut rng = StdRng::seed_from_u64(7);
        let prices = model.sample(&mut rng);
        assert_eq!(prices.len(), 3);
        for price in prices.values() {
            assert!((0.0..100.0).contains(price));
        }
    }

    #[test]
    fn test_blend_update_applies_per_good() {
        let goods = good_set(&["a"]);
        let mut learned = JointPriceModel::new(&goods, 10.0, 100.0);
        let mut window = JointPriceModel::new(&goods, 10.0, 100.0);
        for _ in 0..100 {
            window.add_record(&vector_of(&[("a", 55.0)]));
        }
        let before = learned.histogram("a").unwrap().total();
        learned.blend_update(&window, 0.1);
        assert!(learned.histogram("a").unwrap().total() > before);
    }
}
