use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use crate::goods::{vector_get, AgentId, BidVector, Good, GoodSet, PriceVector, ValuationFn};
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::utils::VERBOSE_AUCTION;

/// Outcome of one simultaneous sealed-bid round.
///
/// Immutable once produced; the series driver appends results to its history
/// log and never rewrites them.
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionRoundResult {
    /// Winning agent per good, None where no positive bid arrived
    pub allocation: BTreeMap<Good, Option<AgentId>>,
    /// Clearing price per good (0 where unallocated)
    pub prices: PriceVector,
    /// Total payment per agent, indexed by AgentId
    pub payments: Vec<f64>,
}

/// Simultaneous sealed-bid kth-price auction over a fixed good universe.
///
/// kth_price = 1 is a first-price auction, 2 a second-price auction, and so
/// on. Each good clears independently.
pub struct SealedBidAuction {
    pub goods: GoodSet,
    pub kth_price: usize,
}

impl SealedBidAuction {
    pub fn new(goods: GoodSet, kth_price: usize) -> Self {
        assert!(kth_price >= 1, "kth_price is 1-indexed");
        Self { goods, kth_price }
    }

    /// Resolve winner and clearing price for every good.
    ///
    /// Per good: positive bids only; highest bid wins (lowest agent id on an
    /// exact tie, keeping seeded runs deterministic); the clearing price is
    /// the bid ranked kth from the top, degrading to the lowest submitted bid
    /// when fewer than k bids exist. The price is added to the winner's
    /// payment total unconditionally - budget enforcement is out of scope
    /// here.
    ///
    /// # Arguments
    /// * `bids_by_agent` - One bid vector per agent, indexed by AgentId
    /// * `logger` - Receives per-good CSV rows (LogEvent::Auction) when
    ///   verbose auction logging is enabled
    pub fn clear_round(&self, bids_by_agent: &[BidVector], logger: &mut Logger) -> AuctionRoundResult {
        let mut allocation = BTreeMap::new();
        let mut prices = PriceVector::new();
        let mut payments = vec![0.0; bids_by_agent.len()];

        for good in &self.goods {
            let mut bid_tuples: Vec<(f64, AgentId)> = bids_by_agent
                .iter()
                .enumerate()
                .filter_map(|(agent_id, bids)| {
                    let bid = vector_get(bids, good);
                    (bid > 0.0).then(|| (bid, agent_id))
                })
                .collect();

            if bid_tuples.is_empty() {
                allocation.insert(good.clone(), None);
                prices.insert(good.clone(), 0.0);
                continue;
            }

            // Descending by bid, ascending by agent id on exact ties
            bid_tuples.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

            let (_, winner) = bid_tuples[0];
            let kth_index = self.kth_price.min(bid_tuples.len()) - 1;
            let clearing_price = bid_tuples[kth_index].0;

            allocation.insert(good.clone(), Some(winner));
            prices.insert(good.clone(), clearing_price);
            payments[winner] += clearing_price;

            if VERBOSE_AUCTION.load(Ordering::Relaxed) {
                logln!(
                    logger,
                    LogEvent::Auction,
                    "{},{},{:.4},{}",
                    good,
                    winner,
                    clearing_price,
                    bid_tuples.len()
                );
            }
        }

        AuctionRoundResult {
            allocation,
            prices,
            payments,
        }
    }
}

/// Realized utility per agent for one round: the value of the goods the agent
/// won minus the agent's total payment. Reads the round result without
/// mutating it.
pub fn utilities(result: &AuctionRoundResult, valuations: &[&dyn ValuationFn]) -> Vec<f64> {
    valuations
        .iter()
        .enumerate()
        .map(|(agent_id, valuation)| {
            let won_goods: GoodSet = result
                .allocation
                .iter()
                .filter(|(_, winner)| **winner == Some(agent_id))
                .map(|(good, _)| good.clone())
                .collect();
            valuation.value(&won_goods) - result.payments[agent_id]
        })
        .collect()
}
