use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use rand::{rngs::StdRng, Rng};

use crate::errors::EngineError;
use crate::goods::AgentId;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::quality::quality_score;
use crate::rival::{RivalPriceTable, SegmentId, NUM_SEGMENTS};
use crate::utils::{count_auction_round, VERBOSE_AUCTION};

/// Which day of the two-day campaign a simulator settles.
/// Quality scores are reported for day 1 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignDay {
    Day1,
    Day2,
}

/// One agent's one-shot submission for a simulated day: CPM bids and
/// impression caps per segment, a campaign budget and reach goal.
///
/// The spend and hit counters belong to the simulator processing the bundle,
/// not to the submitting agent; agents read them back through the accessors
/// after settlement.
#[derive(Debug, Clone)]
pub struct BidBundle {
    pub bids: BTreeMap<SegmentId, f64>,
    pub limits: BTreeMap<SegmentId, u32>,
    pub budget: f64,
    pub reach_goal: u32,
    spend: f64,
    hits: Vec<u32>,
}

impl BidBundle {
    pub fn new(
        bids: BTreeMap<SegmentId, f64>,
        limits: BTreeMap<SegmentId, u32>,
        budget: f64,
        reach_goal: u32,
    ) -> Self {
        Self {
            bids,
            limits,
            budget,
            reach_goal,
            spend: 0.0,
            hits: vec![0; NUM_SEGMENTS],
        }
    }

    /// Build a bundle from per-segment money spending limits instead of
    /// impression caps.
    ///
    /// The cap is floor(spending_limit / bid) impressions; a segment with a
    /// non-positive bid gets cap 0, since a zero bid can never win an
    /// impression anyway. This is the one place the conversion happens.
    pub fn with_spending_limits(
        bids: BTreeMap<SegmentId, f64>,
        spending_limits: BTreeMap<SegmentId, f64>,
        budget: f64,
        reach_goal: u32,
    ) -> Self {
        let limits = spending_limits
            .iter()
            .map(|(segment, limit)| {
                let bid = bids.get(segment).copied().unwrap_or(0.0);
                let cap = if bid > 0.0 { (limit / bid).floor() as u32 } else { 0 };
                (*segment, cap)
            })
            .collect();
        Self::new(bids, limits, budget, reach_goal)
    }

    /// Money spent so far (filled in by the simulator)
    pub fn spend(&self) -> f64 {
        self.spend
    }

    /// Impressions won in one segment (filled in by the simulator)
    pub fn hits(&self, segment: SegmentId) -> u32 {
        self.hits[segment]
    }

    /// Total impressions won across all segments
    pub fn reach_hit(&self) -> u32 {
        self.hits.iter().sum()
    }

    fn bid_for(&self, segment: SegmentId) -> f64 {
        self.bids.get(&segment).copied().unwrap_or(0.0)
    }

    fn limit_for(&self, segment: SegmentId) -> u32 {
        self.limits.get(&segment).copied().unwrap_or(0)
    }
}

/// Per-agent settlement record for one simulated day
#[derive(Debug, Clone, PartialEq)]
pub struct DayResult {
    pub profit: f64,
    pub spend: f64,
    pub reach_hit: u32,
    /// Quality score, present after a day-1 settlement only
    pub qc: Option<f64>,
}

/// One simulated day of the ad exchange: n_auctions independent second-price
/// micro-auctions against a read-only rival price table.
///
/// Each trial draws a segment uniformly from the universe and one rival CPM
/// price from the table. Among agents with a nonzero bid on that segment and
/// headroom under their impression cap, the highest bidder wins iff its bid
/// strictly exceeds the rival price, pays the rival price (CPM converted to
/// per-impression), and has its hit counter incremented. No winner means no
/// state change.
///
/// A simulator instance is single-shot: settling twice would double-charge
/// every bundle, so the second run call fails with BundlesAlreadySubmitted.
pub struct AdxDaySimulator<'a> {
    day: CampaignDay,
    n_auctions: usize,
    rival_table: &'a RivalPriceTable,
    submitted: bool,
}

impl<'a> AdxDaySimulator<'a> {
    pub fn new(day: CampaignDay, n_auctions: usize, rival_table: &'a RivalPriceTable) -> Self {
        Self {
            day,
            n_auctions,
            rival_table,
            submitted: false,
        }
    }

    /// Run all micro-auction trials and settle every bundle.
    ///
    /// Profit per agent is min(reach_hit / reach_goal, 1.0) * budget - spend:
    /// capped at the budget, so overshooting the reach goal buys extra spend
    /// but no extra profit (and can push profit negative). A zero reach goal
    /// counts as already met. With n_auctions = 0 every agent's profit is
    /// exactly 0.
    ///
    /// # Arguments
    /// * `bundles` - One bundle per participating agent; spend/hit counters
    ///   are written in place
    /// * `rng` - PRNG stream for segment and rival price draws
    /// * `logger` - Per-trial CSV rows (LogEvent::Auction) when verbose
    ///   auction logging is enabled, per-agent settlement at LogEvent::Round
    pub fn run(
        &mut self,
        bundles: &mut BTreeMap<AgentId, BidBundle>,
        rng: &mut StdRng,
        logger: &mut Logger,
    ) -> Result<BTreeMap<AgentId, DayResult>, EngineError> {
        if self.submitted {
            return Err(EngineError::BundlesAlreadySubmitted);
        }
        self.submitted = true;

        let num_segments = self.rival_table.num_segments();
        for trial in 0..self.n_auctions {
            let segment: SegmentId = rng.gen_range(0..num_segments);
            let rival_price = self.rival_table.sample(segment, rng);

            // Highest eligible bid; ties go to the lowest agent id since the
            // map iterates in ascending order and the comparison is strict
            let mut best: Option<(AgentId, f64)> = None;
            for (agent_id, bundle) in bundles.iter() {
                let bid = bundle.bid_for(segment);
                if bid > 0.0 && bundle.hits[segment] < bundle.limit_for(segment) {
                    if best.map_or(true, |(_, best_bid)| bid > best_bid) {
                        best = Some((*agent_id, bid));
                    }
                }
            }

            // Second-price rule: must strictly beat the rival, pays the
            // rival's CPM converted to a per-impression price
            if let Some((agent_id, bid)) = best {
                if bid > rival_price {
                    let bundle = bundles
                        .get_mut(&agent_id)
                        .expect("winner came from this map");
                    bundle.spend += rival_price / 1000.0;
                    bundle.hits[segment] += 1;

                    if VERBOSE_AUCTION.load(Ordering::Relaxed) {
                        logln!(
                            logger,
                            LogEvent::Auction,
                            "{},{},{:.4},{},{:.4}",
                            trial,
                            segment,
                            rival_price,
                            agent_id,
                            bid
                        );
                    }
                }
            }
        }

        let mut results = BTreeMap::new();
        for (agent_id, bundle) in bundles.iter() {
            let reach_hit = bundle.reach_hit();
            let reach_ratio = if bundle.reach_goal == 0 {
                1.0
            } else {
                (reach_hit as f64 / bundle.reach_goal as f64).min(1.0)
            };
            let profit = reach_ratio * bundle.budget - bundle.spend;
            let qc = match self.day {
                CampaignDay::Day1 => Some(quality_score(reach_hit, bundle.reach_goal)),
                CampaignDay::Day2 => None,
            };

            logln!(
                logger,
                LogEvent::Round,
                "Agent {}: reach {}/{} spend {:.2} profit {:.2}",
                agent_id,
                reach_hit,
                bundle.reach_goal,
                bundle.spend,
                profit
            );

            results.insert(
                *agent_id,
                DayResult {
                    profit,
                    spend: bundle.spend,
                    reach_hit,
                    qc,
                },
            );
        }

        count_auction_round();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn flat_bundle(bid: f64, limit: u32, budget: f64, reach_goal: u32) -> BidBundle {
        let bids = (0..NUM_SEGMENTS).map(|segment| (segment, bid)).collect();
        let limits = (0..NUM_SEGMENTS).map(|segment| (segment, limit)).collect();
        BidBundle::new(bids, limits, budget, reach_goal)
    }

    #[test]
    fn test_zero_auctions_yield_zero_profit() {
        let table = RivalPriceTable::default_seeded(42);
        let mut simulator = AdxDaySimulator::new(CampaignDay::Day1, 0, &table);
        let mut bundles = BTreeMap::new();
        bundles.insert(0, flat_bundle(10.0, 100, 500.0, 300));
        bundles.insert(1, flat_bundle(5.0, 100, 200.0, 999));

        let mut rng = StdRng::seed_from_u64(1);
        let results = simulator.run(&mut bundles, &mut rng, &mut Logger::new()).unwrap();
        for result in results.values() {
            assert_eq!(result.profit, 0.0);
            assert_eq!(result.spend, 0.0);
            assert_eq!(result.reach_hit, 0);
        }
    }

    #[test]
    fn test_second_run_is_rejected() {
        let table = RivalPriceTable::default_seeded(42);
        let mut simulator = AdxDaySimulator::new(CampaignDay::Day1, 10, &table);
        let mut bundles = BTreeMap::new();
        bundles.insert(0, flat_bundle(10.0, 100, 500.0, 300));

        let mut rng = StdRng::seed_from_u64(2);
        simulator.run(&mut bundles, &mut rng, &mut Logger::new()).unwrap();
        let err = simulator
            .run(&mut bundles, &mut rng, &mut Logger::new())
            .unwrap_err();
        assert_eq!(err, EngineError::BundlesAlreadySubmitted);
    }

    #[test]
    fn test_high_bidder_wins_and_pays_rival_price() {
        let table = RivalPriceTable::default_seeded(42);
        let mut simulator = AdxDaySimulator::new(CampaignDay::Day1, 1000, &table);
        let mut bundles = BTreeMap::new();
        // Bids above the rival bound always win; the zero bidder never does
        bundles.insert(0, flat_bundle(20.0, 1000, 500.0, 500));
        bundles.insert(1, flat_bundle(0.0, 1000, 500.0, 500));

        let mut rng = StdRng::seed_from_u64(3);
        let results = simulator.run(&mut bundles, &mut rng, &mut Logger::new()).unwrap();

        let winner = &results[&0];
        assert_eq!(winner.reach_hit, 1000);
        // Paid per impression: rival CPM / 1000, always below 15 / 1000 each
        assert!(winner.spend > 0.0 && winner.spend < 15.0);
        assert_eq!(results[&1].reach_hit, 0);
        assert_eq!(results[&1].spend, 0.0);
    }

    #[test]
    fn test_impression_caps_bound_wins() {
        let table = RivalPriceTable::default_seeded(42);
        let mut simulator = AdxDaySimulator::new(CampaignDay::Day1, 2000, &table);
        let mut bundles = BTreeMap::new();
        bundles.insert(0, flat_bundle(20.0, 3, 500.0, 500));

        let mut rng = StdRng::seed_from_u64(4);
        let results = simulator.run(&mut bundles, &mut rng, &mut Logger::new()).unwrap();
        // At most 3 impressions per segment
        assert!(results[&0].reach_hit <= 3 * NUM_SEGMENTS as u32);
        let bundle = &bundles[&0];
        for segment in 0..NUM_SEGMENTS {
            assert!(bundle.hits(segment) <= 3);
        }
    }

    #[test]
    fn test_profit_capped_at_budget() {
        let table = RivalPriceTable::default_seeded(42);
        let mut simulator = AdxDaySimulator::new(CampaignDay::Day1, 5000, &table);
        let mut bundles = BTreeMap::new();
        // Tiny reach goal, huge caps: overshoot buys spend but no profit
        bundles.insert(0, flat_bundle(20.0, 10_000, 50.0, 10));

        let mut rng = StdRng::seed_from_u64(5);
        let results = simulator.run(&mut bundles, &mut rng, &mut Logger::new()).unwrap();
        let result = &results[&0];
        assert!(result.reach_hit > 10);
        assert!(result.profit <= 50.0);
        assert!((result.profit - (50.0 - result.spend)).abs() < 1e-9);
    }

    #[test]
    fn test_day1_reports_qc_day2_does_not() {
        let table = RivalPriceTable::default_seeded(42);
        let mut rng = StdRng::seed_from_u64(6);

        let mut day1 = AdxDaySimulator::new(CampaignDay::Day1, 100, &table);
        let mut bundles = BTreeMap::new();
        bundles.insert(0, flat_bundle(20.0, 100, 100.0, 100));
        let results = day1.run(&mut bundles, &mut rng, &mut Logger::new()).unwrap();
        let qc = results[&0].qc.expect("day 1 reports qc");
        assert!((0.0..=1.0).contains(&qc));

        let mut day2 = AdxDaySimulator::new(CampaignDay::Day2, 100, &table);
        let mut bundles = BTreeMap::new();
        bundles.insert(0, flat_bundle(20.0, 100, 100.0, 100));
        let results = day2.run(&mut bundles, &mut rng, &mut Logger::new()).unwrap();
        assert_eq!(results[&0].qc, None);
    }

    #[test]
    fn test_spending_limit_conversion() {
        let bids: BTreeMap<SegmentId, f64> = [(0, 4.0), (1, 0.0)].into_iter().collect();
        let spending_limits: BTreeMap<SegmentId, f64> =
            [(0, 10.0), (1, 10.0)].into_iter().collect();
        let bundle = BidBundle::with_spending_limits(bids, spending_limits, 100.0, 50);
        assert_eq!(bundle.limit_for(0), 2);
        // Zero bid: cap degenerates to 0 instead of dividing by zero
        assert_eq!(bundle.limit_for(1), 0);
    }
}
