use std::rc::Rc;

use rand::{rngs::StdRng, Rng};

use crate::clearing::AuctionRoundResult;
use crate::errors::EngineError;
use crate::goods::{vector_get, AgentId, BidVector, GoodSet, PriceVector, ValuationFn};
use crate::localbid::LocalBidOptimizer;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::marginal::marginal_value;
use crate::price_model::JointPriceModel;

/// Trait for bidding strategies in the repeated sealed-bid game.
///
/// A bidder is configured once via setup (good universe, valuation, auction
/// parameters), then alternates get_bids/observe per round. Bidders own all
/// of their learning state; nothing is shared between bidders.
pub trait BidderTrait {
    /// Get the bidder's display name
    fn name(&self) -> &str;

    /// Bind the good universe, the bidder's valuation function, and the
    /// auction's kth-price parameter. Must be called before the first round.
    fn setup(&mut self, goods: GoodSet, valuation: Rc<dyn ValuationFn>, kth_price: usize);

    /// Compute the bid vector for the next round
    ///
    /// Returns MissingValuation if the strategy needs a valuation function
    /// and none was bound - there is no safe default to fall back on.
    fn get_bids(&mut self, rng: &mut StdRng, logger: &mut Logger) -> Result<BidVector, EngineError>;

    /// Feed back one cleared round: the immutable result plus every agent's
    /// submitted bids, so learners can extract rival behavior
    fn observe(
        &mut self,
        own_id: AgentId,
        result: &AuctionRoundResult,
        all_bids: &[BidVector],
        logger: &mut Logger,
    );

    /// Downcast support, for callers that need a concrete bidder back out of
    /// a trait object (e.g. to read a learner's model after a series)
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Highest rival bid per good, the price signal a learner would have faced.
/// Goods nobody else bid on predict as price 0.
fn rival_price_vector(own_id: AgentId, goods: &GoodSet, all_bids: &[BidVector]) -> PriceVector {
    goods
        .iter()
        .map(|good| {
            let best_rival = all_bids
                .iter()
                .enumerate()
                .filter(|(agent_id, _)| *agent_id != own_id)
                .map(|(_, bids)| vector_get(bids, good))
                .fold(0.0, f64::max);
            (good.clone(), best_rival)
        })
        .collect()
}

/// Uniform random bidder, the baseline opponent in training runs
pub struct RandomBidder {
    name: String,
    min_bid: f64,
    max_bid: f64,
    goods: GoodSet,
}

impl RandomBidder {
    pub fn new(name: &str, min_bid: f64, max_bid: f64) -> Self {
        Self {
            name: name.to_string(),
            min_bid,
            max_bid,
            goods: GoodSet::new(),
        }
    }
}

impl BidderTrait for RandomBidder {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, goods: GoodSet, _valuation: Rc<dyn ValuationFn>, _kth_price: usize) {
        self.goods = goods;
    }

    fn get_bids(&mut self, rng: &mut StdRng, _logger: &mut Logger) -> Result<BidVector, EngineError> {
        Ok(self
            .goods
            .iter()
            .map(|good| (good.clone(), rng.gen_range(self.min_bid..self.max_bid)))
            .collect())
    }

    fn observe(
        &mut self,
        _own_id: AgentId,
        _result: &AuctionRoundResult,
        _all_bids: &[BidVector],
        _logger: &mut Logger,
    ) {
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Bids a fraction of each good's marginal value against the previous
/// round's clearing prices (first round: all-zero prices)
pub struct MarginalValueBidder {
    name: String,
    bid_fraction: f64,
    goods: GoodSet,
    valuation: Option<Rc<dyn ValuationFn>>,
    last_prices: PriceVector,
}

impl MarginalValueBidder {
    /// # Arguments
    /// * `bid_fraction` - Shading factor applied to the marginal value
    ///   (1.0 bids truthfully, above 1.0 bids aggressively)
    pub fn new(name: &str, bid_fraction: f64) -> Self {
        Self {
            name: name.to_string(),
            bid_fraction,
            goods: GoodSet::new(),
            valuation: None,
            last_prices: PriceVector::new(),
        }
    }
}

impl BidderTrait for MarginalValueBidder {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, goods: GoodSet, valuation: Rc<dyn ValuationFn>, _kth_price: usize) {
        self.goods = goods;
        self.valuation = Some(valuation);
    }

    fn get_bids(&mut self, _rng: &mut StdRng, _logger: &mut Logger) -> Result<BidVector, EngineError> {
        let valuation = self
            .valuation
            .as_ref()
            .ok_or_else(|| EngineError::MissingValuation {
                bidder: self.name.clone(),
            })?;

        // Previous bids are irrelevant here: the won-set test runs against
        // the last clearing prices with a zero bid vector, so the bundle
        // context is "won nothing yet"
        let no_bids = BidVector::new();
        Ok(self
            .goods
            .iter()
            .map(|good| {
                let mv = marginal_value(
                    &self.goods,
                    good,
                    valuation.as_ref(),
                    &no_bids,
                    &self.last_prices,
                );
                (good.clone(), self.bid_fraction * mv.max(0.0))
            })
            .collect())
    }

    fn observe(
        &mut self,
        _own_id: AgentId,
        result: &AuctionRoundResult,
        _all_bids: &[BidVector],
        _logger: &mut Logger,
    ) {
        self.last_prices = result.prices.clone();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Hyperparameters for the SCPP learner
pub struct ScppConfig {
    /// EMA weight for blending an observation window into the learned model
    pub alpha: f64,
    /// Rounds per observation window before a blend happens
    pub rounds_per_update: usize,
    /// Histogram bucket width
    pub bucket_size: f64,
    /// Histogram upper bound (prices at or above clip into the last bucket)
    pub upper_bound: f64,
    pub optimizer: LocalBidOptimizer,
}

impl Default for ScppConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            rounds_per_update: 10,
            bucket_size: 5.0,
            upper_bound: 100.0,
            optimizer: LocalBidOptimizer::new(),
        }
    }
}

/// Self-confirming price-prediction bidder.
///
/// Learns an empirical distribution of rival prices per good: each round the
/// highest rival bid per good is recorded into a current observation window,
/// and every rounds_per_update rounds the window is exponentially blended
/// into the learned model (then reset). Bids come from running LocalBid with
/// expected marginal values against the learned model.
pub struct ScppBidder {
    name: String,
    config: ScppConfig,
    goods: GoodSet,
    valuation: Option<Rc<dyn ValuationFn>>,
    learned_model: Option<JointPriceModel>,
    window_model: Option<JointPriceModel>,
    rounds_in_window: usize,
}

impl ScppBidder {
    pub fn new(name: &str, config: ScppConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            goods: GoodSet::new(),
            valuation: None,
            learned_model: None,
            window_model: None,
            rounds_in_window: 0,
        }
    }

    fn fresh_model(&self) -> JointPriceModel {
        JointPriceModel::new(&self.goods, self.config.bucket_size, self.config.upper_bound)
    }

    /// Read access to the learned model (scenario validation)
    pub fn learned_model(&self) -> Option<&JointPriceModel> {
        self.learned_model.as_ref()
    }
}

impl BidderTrait for ScppBidder {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, goods: GoodSet, valuation: Rc<dyn ValuationFn>, _kth_price: usize) {
        self.goods = goods;
        self.valuation = Some(valuation);
        self.learned_model = Some(self.fresh_model());
        self.window_model = Some(self.fresh_model());
        self.rounds_in_window = 0;
    }

    fn get_bids(&mut self, rng: &mut StdRng, _logger: &mut Logger) -> Result<BidVector, EngineError> {
        let valuation = self
            .valuation
            .as_ref()
            .ok_or_else(|| EngineError::MissingValuation {
                bidder: self.name.clone(),
            })?;
        let learned_model = self
            .learned_model
            .as_ref()
            .expect("setup initializes the learned model together with the valuation");

        Ok(self.config.optimizer.optimize_expected(
            &self.goods,
            valuation.as_ref(),
            learned_model,
            rng,
        ))
    }

    fn observe(
        &mut self,
        own_id: AgentId,
        _result: &AuctionRoundResult,
        all_bids: &[BidVector],
        logger: &mut Logger,
    ) {
        let (Some(learned_model), Some(window_model)) =
            (self.learned_model.as_mut(), self.window_model.as_mut())
        else {
            return;
        };

        let predicted_prices = rival_price_vector(own_id, &self.goods, all_bids);
        window_model.add_record(&predicted_prices);
        self.rounds_in_window += 1;

        if self.rounds_in_window % self.config.rounds_per_update == 0 {
            learned_model.blend_update(window_model, self.config.alpha);
            *window_model = JointPriceModel::new(
                &self.goods,
                self.config.bucket_size,
                self.config.upper_bound,
            );
            logln!(
                logger,
                LogEvent::Learning,
                "{}: blended {}-round window into learned model (alpha={})",
                self.name,
                self.config.rounds_per_update,
                self.config.alpha
            );
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goods::good_set;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn additive(bundle: &GoodSet) -> f64 {
        bundle.len() as f64 * 10.0
    }

    #[test]
    fn test_missing_valuation_is_fatal() {
        let mut bidder = MarginalValueBidder::new("mv", 1.0);
        let mut rng = StdRng::seed_from_u64(0);
        let err = bidder.get_bids(&mut rng, &mut Logger::new()).unwrap_err();
        assert_eq!(
            err,
            EngineError::MissingValuation {
                bidder: "mv".to_string()
            }
        );
    }

    #[test]
    fn test_random_bidder_stays_in_range() {
        let mut bidder = RandomBidder::new("rnd", 1.0, 20.0);
        bidder.setup(good_set(&["a", "b"]), Rc::new(additive), 1);
        let mut rng = StdRng::seed_from_u64(5);
        let bids = bidder.get_bids(&mut rng, &mut Logger::new()).unwrap();
        assert_eq!(bids.len(), 2);
        for bid in bids.values() {
            assert!((1.0..20.0).contains(bid));
        }
    }

    #[test]
    fn test_rival_price_vector_excludes_own_bids() {
        let goods = good_set(&["a"]);
        let all_bids = vec![
            crate::goods::vector_of(&[("a", 50.0)]),
            crate::goods::vector_of(&[("a", 8.0)]),
        ];
        let prices = rival_price_vector(0, &goods, &all_bids);
        assert_eq!(prices["a"], 8.0);
    }

    #[test]
    fn test_scpp_blends_window_on_schedule() {
        let mut bidder = ScppBidder::new(
            "scpp",
            ScppConfig {
                rounds_per_update: 2,
                ..ScppConfig::default()
            },
        );
        bidder.setup(good_set(&["a"]), Rc::new(additive), 2);

        let result = AuctionRoundResult {
            allocation: BTreeMap::new(),
            prices: PriceVector::new(),
            payments: vec![0.0, 0.0],
        };
        let all_bids = vec![
            crate::goods::vector_of(&[("a", 0.0)]),
            crate::goods::vector_of(&[("a", 42.0)]),
        ];

        let mut logger = Logger::new();
        let before = bidder.learned_model().unwrap().histogram("a").unwrap().total();
        bidder.observe(0, &result, &all_bids, &mut logger);
        // Window not full yet: learned model untouched
        let mid = bidder.learned_model().unwrap().histogram("a").unwrap().total();
        assert_eq!(before, mid);
        bidder.observe(0, &result, &all_bids, &mut logger);
        let after = bidder.learned_model().unwrap().histogram("a").unwrap().total();
        assert!(after > before);
    }

    #[test]
    fn test_scpp_bids_settle_at_additive_values() {
        let mut bidder = ScppBidder::new("scpp", ScppConfig::default());
        bidder.setup(good_set(&["a", "b"]), Rc::new(additive), 2);
        let mut rng = StdRng::seed_from_u64(9);
        let bids = bidder.get_bids(&mut rng, &mut Logger::new()).unwrap();
        // Additive valuation: the price model is irrelevant and every bid
        // settles at the per-good value
        for bid in bids.values() {
            assert!((bid - 10.0).abs() < 0.01);
        }
    }
}
