use std::collections::BTreeMap;

use rand::{rngs::StdRng, Rng};

use crate::adx_day::{AdxDaySimulator, BidBundle, CampaignDay, DayResult};
use crate::errors::EngineError;
use crate::goods::AgentId;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::rival::{RivalPriceTable, SegmentId};

/// An ad campaign: the segment it targets, the impressions it needs, and the
/// money it pays out when fully served
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: usize,
    pub segment: SegmentId,
    pub reach: u32,
    pub budget: f64,
}

/// Fractions of a segment's expected arrivals used as campaign reach goals
const REACH_FACTORS: [f64; 3] = [0.3, 0.5, 0.7];

/// Phase of a two-day game.
///
/// The transition Day1 -> Day2 fires exactly once and carries each agent's
/// quality score as its payload; Done is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum GamePhase {
    Day1,
    Day2 { quality_scores: BTreeMap<AgentId, f64> },
    Done,
}

/// Two-day ad-exchange game: two single-shot day simulators chained by the
/// quality score.
///
/// Each agent gets two independently generated campaigns (day 1, day 2). The
/// day-1 settlement computes each agent's quality score exactly once; the
/// score is exposed while the game is in Day2 so the caller can pre-scale its
/// day-2 submission - the engine itself never rescales bids, limits, or
/// budgets. Submitting a day out of order, or anything after both days have
/// settled, is a fatal error.
pub struct TwoDayAdxGame<'a> {
    n_auctions: usize,
    rival_table: &'a RivalPriceTable,
    campaigns_day1: Vec<Campaign>,
    campaigns_day2: Vec<Campaign>,
    phase: GamePhase,
}

impl<'a> TwoDayAdxGame<'a> {
    /// Generate campaigns for both days and start in Day1.
    ///
    /// Reach goals are a random factor (0.3, 0.5, or 0.7) of a segment's
    /// expected arrivals under uniform segment draws; budget pays $1 per
    /// impression of the goal.
    pub fn new(
        num_players: usize,
        n_auctions: usize,
        rival_table: &'a RivalPriceTable,
        rng: &mut StdRng,
    ) -> Self {
        let mut campaigns_day1 = Vec::with_capacity(num_players);
        let mut campaigns_day2 = Vec::with_capacity(num_players);
        for player in 0..num_players {
            campaigns_day1.push(Self::generate_campaign(
                player,
                1,
                n_auctions,
                rival_table.num_segments(),
                rng,
            ));
            campaigns_day2.push(Self::generate_campaign(
                player,
                2,
                n_auctions,
                rival_table.num_segments(),
                rng,
            ));
        }
        Self {
            n_auctions,
            rival_table,
            campaigns_day1,
            campaigns_day2,
            phase: GamePhase::Day1,
        }
    }

    fn generate_campaign(
        player: usize,
        day: usize,
        n_auctions: usize,
        num_segments: usize,
        rng: &mut StdRng,
    ) -> Campaign {
        let segment = rng.gen_range(0..num_segments);
        let avg_arrivals = n_auctions as f64 / num_segments as f64;
        let factor = REACH_FACTORS[rng.gen_range(0..REACH_FACTORS.len())];
        let reach = (avg_arrivals * factor) as u32;
        Campaign {
            id: player * 10 + day,
            segment,
            reach,
            // $1 per impression of the goal
            budget: reach as f64,
        }
    }

    pub fn campaigns_day1(&self) -> &[Campaign] {
        &self.campaigns_day1
    }

    pub fn campaigns_day2(&self) -> &[Campaign] {
        &self.campaigns_day2
    }

    pub fn phase(&self) -> &GamePhase {
        &self.phase
    }

    /// Day-1 quality scores, available while the game waits for day 2
    pub fn quality_scores(&self) -> Option<&BTreeMap<AgentId, f64>> {
        match &self.phase {
            GamePhase::Day2 { quality_scores } => Some(quality_scores),
            _ => None,
        }
    }

    /// Settle day 1, compute every agent's quality score, and transition to
    /// Day2 with the scores as transition payload
    pub fn submit_day1(
        &mut self,
        bundles: &mut BTreeMap<AgentId, BidBundle>,
        rng: &mut StdRng,
        logger: &mut Logger,
    ) -> Result<BTreeMap<AgentId, DayResult>, EngineError> {
        match self.phase {
            GamePhase::Day1 => {}
            GamePhase::Day2 { .. } => {
                return Err(EngineError::DayOutOfOrder { expected: 2, got: 1 })
            }
            GamePhase::Done => return Err(EngineError::GameFinished),
        }

        let mut simulator = AdxDaySimulator::new(CampaignDay::Day1, self.n_auctions, self.rival_table);
        let results = simulator.run(bundles, rng, logger)?;

        let quality_scores: BTreeMap<AgentId, f64> = results
            .iter()
            .map(|(agent_id, result)| {
                let qc = result.qc.expect("day-1 settlement always reports qc");
                (*agent_id, qc)
            })
            .collect();
        for (agent_id, qc) in &quality_scores {
            logln!(logger, LogEvent::Round, "Agent {}: day-1 quality score {:.4}", agent_id, qc);
        }

        self.phase = GamePhase::Day2 { quality_scores };
        Ok(results)
    }

    /// Settle day 2 and finish the game. The caller is expected to have
    /// pre-scaled its day-2 bundle with the day-1 quality score.
    pub fn submit_day2(
        &mut self,
        bundles: &mut BTreeMap<AgentId, BidBundle>,
        rng: &mut StdRng,
        logger: &mut Logger,
    ) -> Result<BTreeMap<AgentId, DayResult>, EngineError> {
        match self.phase {
            GamePhase::Day2 { .. } => {}
            GamePhase::Day1 => {
                return Err(EngineError::DayOutOfOrder { expected: 1, got: 2 })
            }
            GamePhase::Done => return Err(EngineError::GameFinished),
        }

        let mut simulator = AdxDaySimulator::new(CampaignDay::Day2, self.n_auctions, self.rival_table);
        let results = simulator.run(bundles, rng, logger)?;

        self.phase = GamePhase::Done;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rival::NUM_SEGMENTS;
    use rand::SeedableRng;

    fn focused_bundle(campaign: &Campaign, bid: f64) -> BidBundle {
        let bids = [(campaign.segment, bid)].into_iter().collect();
        let limits = [(campaign.segment, campaign.reach)].into_iter().collect();
        BidBundle::new(bids, limits, campaign.budget, campaign.reach)
    }

    #[test]
    fn test_campaign_generation_ranges() {
        let table = RivalPriceTable::default_seeded(42);
        let mut rng = StdRng::seed_from_u64(1);
        let game = TwoDayAdxGame::new(3, 10_000, &table, &mut rng);

        assert_eq!(game.campaigns_day1().len(), 3);
        assert_eq!(game.campaigns_day2().len(), 3);
        let avg_arrivals = 10_000.0 / NUM_SEGMENTS as f64;
        for campaign in game.campaigns_day1().iter().chain(game.campaigns_day2()) {
            assert!(campaign.segment < NUM_SEGMENTS);
            assert!(campaign.reach >= (avg_arrivals * 0.3) as u32 - 1);
            assert!(campaign.reach <= (avg_arrivals * 0.7) as u32);
            assert_eq!(campaign.budget, campaign.reach as f64);
        }
    }

    #[test]
    fn test_phase_machine_happy_path() {
        let table = RivalPriceTable::default_seeded(42);
        let mut rng = StdRng::seed_from_u64(2);
        let mut game = TwoDayAdxGame::new(1, 1000, &table, &mut rng);
        assert_eq!(*game.phase(), GamePhase::Day1);
        assert_eq!(game.quality_scores(), None);

        let campaign = game.campaigns_day1()[0].clone();
        let mut bundles = BTreeMap::new();
        bundles.insert(0, focused_bundle(&campaign, 20.0));
        let mut logger = Logger::new();
        let results = game.submit_day1(&mut bundles, &mut rng, &mut logger).unwrap();
        assert!(results[&0].qc.is_some());

        let scores = game.quality_scores().expect("scores carried into Day2");
        assert!((0.0..=1.0).contains(&scores[&0]));

        let campaign = game.campaigns_day2()[0].clone();
        let mut bundles = BTreeMap::new();
        bundles.insert(0, focused_bundle(&campaign, 20.0));
        let results = game.submit_day2(&mut bundles, &mut rng, &mut logger).unwrap();
        assert_eq!(results[&0].qc, None);
        assert_eq!(*game.phase(), GamePhase::Done);
    }

    #[test]
    fn test_out_of_order_submissions_fail() {
        let table = RivalPriceTable::default_seeded(42);
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = TwoDayAdxGame::new(1, 100, &table, &mut rng);
        let mut logger = Logger::new();

        // Day 2 before day 1
        let mut bundles = BTreeMap::new();
        bundles.insert(0, focused_bundle(&game.campaigns_day2()[0].clone(), 20.0));
        let err = game.submit_day2(&mut bundles, &mut rng, &mut logger).unwrap_err();
        assert_eq!(err, EngineError::DayOutOfOrder { expected: 1, got: 2 });

        // Day 1 twice
        let mut bundles = BTreeMap::new();
        bundles.insert(0, focused_bundle(&game.campaigns_day1()[0].clone(), 20.0));
        game.submit_day1(&mut bundles, &mut rng, &mut logger).unwrap();
        let err = game.submit_day1(&mut bundles, &mut rng, &mut logger).unwrap_err();
        assert_eq!(err, EngineError::DayOutOfOrder { expected: 2, got: 1 });

        // Anything after Done
        let mut bundles = BTreeMap::new();
        bundles.insert(0, focused_bundle(&game.campaigns_day2()[0].clone(), 20.0));
        game.submit_day2(&mut bundles, &mut rng, &mut logger).unwrap();
        let err = game.submit_day1(&mut bundles, &mut rng, &mut logger).unwrap_err();
        assert_eq!(err, EngineError::GameFinished);
        let err = game.submit_day2(&mut bundles, &mut rng, &mut logger).unwrap_err();
        assert_eq!(err, EngineError::GameFinished);
    }
}
