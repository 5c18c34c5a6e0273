use std::rc::Rc;

use rand::rngs::StdRng;

use crate::bidders::BidderTrait;
use crate::clearing::{utilities, AuctionRoundResult, SealedBidAuction};
use crate::errors::EngineError;
use crate::goods::{BidVector, GoodSet, ValuationFn};
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::utils::count_auction_round;

/// Cumulative statistics for a single agent across a series
pub struct AgentStat {
    pub total_utility: f64,
    pub total_payment: f64,
    pub goods_won: usize,
}

/// Complete series statistics
pub struct SeriesStat {
    pub agent_stats: Vec<AgentStat>,
    pub rounds: usize,
}

impl SeriesStat {
    fn new(num_agents: usize) -> Self {
        let agent_stats = (0..num_agents)
            .map(|_| AgentStat {
                total_utility: 0.0,
                total_payment: 0.0,
                goods_won: 0,
            })
            .collect();
        Self {
            agent_stats,
            rounds: 0,
        }
    }

    fn accumulate(&mut self, result: &AuctionRoundResult, round_utilities: &[f64]) {
        self.rounds += 1;
        for (agent_id, stat) in self.agent_stats.iter_mut().enumerate() {
            stat.total_utility += round_utilities[agent_id];
            stat.total_payment += result.payments[agent_id];
            stat.goods_won += result
                .allocation
                .values()
                .filter(|winner| **winner == Some(agent_id))
                .count();
        }
    }

    /// Output per-agent statistics
    pub fn printout(&self, bidders: &[Box<dyn BidderTrait>], logger: &mut Logger, event: LogEvent) {
        for (agent_id, stat) in self.agent_stats.iter().enumerate() {
            logln!(logger, event, "\nAgent {} ({})", agent_id, bidders[agent_id].name());
            logln!(logger, event, "  Goods Won: {} over {} rounds", stat.goods_won, self.rounds);
            logln!(logger, event, "  Total Payments: {:.2}", stat.total_payment);
            let utility_per_round = if self.rounds > 0 {
                stat.total_utility / self.rounds as f64
            } else {
                0.0
            };
            logln!(logger, event, "  Total Utility: {:.2} (per round: {:.4})",
                     stat.total_utility, utility_per_round);
        }
    }
}

/// Driver for the repeated simultaneous sealed-bid auction game.
///
/// Each round: collect one bid vector per bidder, clear all goods, account
/// utilities, append the immutable round result to the history, and feed the
/// round back to every bidder so learners can update their price models.
pub struct AuctionSeries {
    pub auction: SealedBidAuction,
    pub bidders: Vec<Box<dyn BidderTrait>>,
    valuations: Vec<Rc<dyn ValuationFn>>,
    pub history: Vec<AuctionRoundResult>,
}

impl AuctionSeries {
    /// Create a series and set up every bidder with the good universe, its
    /// valuation, and the auction's kth-price parameter
    pub fn new(
        goods: GoodSet,
        kth_price: usize,
        entries: Vec<(Box<dyn BidderTrait>, Rc<dyn ValuationFn>)>,
    ) -> Self {
        let auction = SealedBidAuction::new(goods, kth_price);
        let mut bidders = Vec::with_capacity(entries.len());
        let mut valuations = Vec::with_capacity(entries.len());
        for (mut bidder, valuation) in entries {
            bidder.setup(auction.goods.clone(), Rc::clone(&valuation), kth_price);
            bidders.push(bidder);
            valuations.push(valuation);
        }
        Self {
            auction,
            bidders,
            valuations,
            history: Vec::new(),
        }
    }

    /// Run num_rounds rounds and return cumulative statistics
    ///
    /// # Arguments
    /// * `num_rounds` - Number of rounds to play
    /// * `rng` - Single PRNG stream shared by all bidders this series
    /// * `logger` - Round results go to LogEvent::Round, learner updates to
    ///   LogEvent::Learning
    pub fn run(
        &mut self,
        num_rounds: usize,
        rng: &mut StdRng,
        logger: &mut Logger,
    ) -> Result<SeriesStat, EngineError> {
        let mut stats = SeriesStat::new(self.bidders.len());

        for round in 0..num_rounds {
            let mut all_bids: Vec<BidVector> = Vec::with_capacity(self.bidders.len());
            for bidder in &mut self.bidders {
                all_bids.push(bidder.get_bids(rng, logger)?);
            }

            let result = self.auction.clear_round(&all_bids, logger);
            let valuation_refs: Vec<&dyn ValuationFn> =
                self.valuations.iter().map(|v| v.as_ref()).collect();
            let round_utilities = utilities(&result, &valuation_refs);

            logln!(logger, LogEvent::Round, "Round {}: payments {:?}, utilities {:?}",
                     round + 1,
                     result.payments.iter().map(|p| (p * 100.0).round() / 100.0).collect::<Vec<_>>(),
                     round_utilities.iter().map(|u| (u * 100.0).round() / 100.0).collect::<Vec<_>>());

            stats.accumulate(&result, &round_utilities);
            for (agent_id, bidder) in self.bidders.iter_mut().enumerate() {
                bidder.observe(agent_id, &result, &all_bids, logger);
            }
            self.history.push(result);
            count_auction_round();
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidders::MarginalValueBidder;
    use crate::goods::{good_set, GoodSet};
    use rand::SeedableRng;

    fn additive(bundle: &GoodSet) -> f64 {
        bundle.len() as f64 * 10.0
    }

    fn small(bundle: &GoodSet) -> f64 {
        bundle.len() as f64 * 4.0
    }

    #[test]
    fn test_series_runs_and_accumulates() {
        let entries: Vec<(Box<dyn BidderTrait>, Rc<dyn ValuationFn>)> = vec![
            (Box::new(MarginalValueBidder::new("big", 1.0)), Rc::new(additive)),
            (Box::new(MarginalValueBidder::new("small", 1.0)), Rc::new(small)),
        ];
        let mut series = AuctionSeries::new(good_set(&["a", "b"]), 2, entries);
        let mut rng = StdRng::seed_from_u64(3);
        let stats = series.run(5, &mut rng, &mut Logger::new()).unwrap();

        assert_eq!(stats.rounds, 5);
        assert_eq!(series.history.len(), 5);
        // The additive-10 bidder outbids the additive-4 bidder on every good;
        // second price makes each win cost 4, for utility 6 per good
        assert_eq!(stats.agent_stats[0].goods_won, 10);
        assert!((stats.agent_stats[0].total_utility - 60.0).abs() < 1e-9);
        assert_eq!(stats.agent_stats[1].goods_won, 0);
        assert_eq!(stats.agent_stats[1].total_utility, 0.0);
    }

    #[test]
    fn test_history_is_append_only_round_results() {
        let entries: Vec<(Box<dyn BidderTrait>, Rc<dyn ValuationFn>)> = vec![(
            Box::new(MarginalValueBidder::new("solo", 1.0)),
            Rc::new(additive),
        )];
        let mut series = AuctionSeries::new(good_set(&["a"]), 1, entries);
        let mut rng = StdRng::seed_from_u64(4);
        series.run(3, &mut rng, &mut Logger::new()).unwrap();

        for result in &series.history {
            assert_eq!(result.allocation["a"], Some(0));
            assert_eq!(result.prices["a"], 10.0);
        }
    }
}
