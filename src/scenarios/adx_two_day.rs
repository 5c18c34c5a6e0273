/// Runs the two-day ad-exchange game twice:
///
/// - an empty-day variant (n_auctions = 0), where every agent's profit must
///   be exactly zero regardless of reach goals
///
/// - a full variant with a focused bidder (caps at its reach goal) against
///   an overshooting bidder (caps far beyond it), validating the profit cap,
///   the overshoot penalty, the quality-score range, and the phase machine

use std::collections::BTreeMap;

use rand::{rngs::StdRng, SeedableRng};

use crate::adx_day::BidBundle;
use crate::errors::EngineError;
use crate::goods::AgentId;
use crate::logger::{LogEvent, Logger};
use crate::rival::{RivalPriceTable, SegmentId};
use crate::two_day::{Campaign, TwoDayAdxGame};
use crate::utils::get_seed;
use crate::logln;
use crate::errln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "adx",
    run,
});

const N_AUCTIONS: usize = 10_000;
/// Above the rival CPM bound, so every eligible trial is won
const STRONG_BID: f64 = 20.0;

/// Bundle bidding on one segment, stopping at cap_factor times the
/// campaign's reach goal
fn bundle_on(campaign: &Campaign, segment: SegmentId, bid_cpm: f64, cap_factor: f64) -> BidBundle {
    let bids: BTreeMap<SegmentId, f64> = [(segment, bid_cpm)].into_iter().collect();
    let cap = (campaign.reach as f64 * cap_factor) as u32;
    let limits: BTreeMap<SegmentId, u32> = [(segment, cap)].into_iter().collect();
    BidBundle::new(bids, limits, campaign.budget, campaign.reach)
}

/// Pick a segment for the second agent that avoids the first agent's, so the
/// two bundles never compete for the same impressions
fn disjoint_segment(preferred: SegmentId, taken: SegmentId, num_segments: usize) -> SegmentId {
    if preferred == taken {
        (preferred + 1) % num_segments
    } else {
        preferred
    }
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let rival_table = RivalPriceTable::default_seeded(get_seed(80));
    let mut errors = Vec::new();

    // Variant: empty day
    logln!(logger, LogEvent::Variant, "\n=== Two-day game with zero auctions per day ===");
    let mut rng = StdRng::seed_from_u64(get_seed(81));
    let mut game = TwoDayAdxGame::new(2, 0, &rival_table, &mut rng);
    let mut bundles: BTreeMap<AgentId, BidBundle> = (0..2)
        .map(|agent| {
            let campaign = &game.campaigns_day1()[agent];
            (agent, bundle_on(campaign, campaign.segment, STRONG_BID, 1.0))
        })
        .collect();
    let results = game.submit_day1(&mut bundles, &mut rng, logger)?;

    let msg = format!(
        "Empty day yields exactly zero profit for every agent: {:?}",
        results.values().map(|r| r.profit).collect::<Vec<_>>()
    );
    if results.values().all(|r| r.profit == 0.0 && r.spend == 0.0) {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    // Variant: full game, focused vs overshooting bidder
    logln!(logger, LogEvent::Variant, "\n=== Two-day game with {} auctions per day ===", N_AUCTIONS);
    let mut rng = StdRng::seed_from_u64(get_seed(82));
    let mut game = TwoDayAdxGame::new(2, N_AUCTIONS, &rival_table, &mut rng);

    // Agent 0 caps at its reach goal; agent 1 keeps buying at 10x the goal.
    // The two bundles target disjoint segments so neither starves the other.
    let campaign_0 = game.campaigns_day1()[0].clone();
    let campaign_1 = game.campaigns_day1()[1].clone();
    let segment_1 = disjoint_segment(campaign_1.segment, campaign_0.segment, rival_table.num_segments());
    let mut bundles: BTreeMap<AgentId, BidBundle> = BTreeMap::new();
    bundles.insert(0, bundle_on(&campaign_0, campaign_0.segment, STRONG_BID, 1.0));
    bundles.insert(1, bundle_on(&campaign_1, segment_1, STRONG_BID, 10.0));
    let day1 = game.submit_day1(&mut bundles, &mut rng, logger)?;

    // Check: reentry of day 1 is rejected once the phase advanced
    let reentry = game.submit_day1(&mut bundles, &mut rng, logger);
    let msg = "Resubmitting day 1 is rejected after settlement".to_string();
    if reentry == Err(EngineError::DayOutOfOrder { expected: 2, got: 1 }) {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    // Check: day-1 quality scores exist and stay within [0, 1]
    let quality_scores = game.quality_scores().cloned().unwrap_or_default();
    let msg = format!(
        "Day-1 quality scores lie in [0, 1]: {:?}",
        quality_scores.values().map(|qc| (qc * 1e4).round() / 1e4).collect::<Vec<_>>()
    );
    if quality_scores.len() == 2 && quality_scores.values().all(|qc| (0.0..=1.0).contains(qc)) {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    // Check: profit never exceeds the campaign budget
    let msg = format!(
        "Day-1 profits stay within campaign budgets: {:?}",
        day1.values().map(|r| (r.profit * 100.0).round() / 100.0).collect::<Vec<_>>()
    );
    if (0..2).all(|agent| day1[&agent].profit <= game.campaigns_day1()[agent].budget) {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    // Check: overshooting the reach goal buys spend, not profit
    let overshoot = &day1[&1];
    let goal = campaign_1.reach;
    let msg = format!(
        "Overshooter exceeds its goal ({} > {}) yet profit is capped: {:.2} <= {:.2}",
        overshoot.reach_hit,
        goal,
        overshoot.profit,
        campaign_1.budget - overshoot.spend
    );
    if overshoot.reach_hit > goal
        && (overshoot.profit - (campaign_1.budget - overshoot.spend)).abs() < 1e-9
    {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    // Day 2: the engine never rescales, so the caller applies its quality
    // score to its own day-2 bids before submitting
    let mut bundles: BTreeMap<AgentId, BidBundle> = BTreeMap::new();
    for agent in 0..2 {
        let campaign = &game.campaigns_day2()[agent];
        let qc = quality_scores.get(&agent).copied().unwrap_or(1.0);
        bundles.insert(agent, bundle_on(campaign, campaign.segment, STRONG_BID * qc, 1.0));
    }
    let day2 = game.submit_day2(&mut bundles, &mut rng, logger)?;

    // Check: day 2 reports no quality score and finishes the game
    let msg = "Day-2 settlement carries no quality score and ends the game".to_string();
    let finished = game.submit_day2(&mut bundles, &mut rng, logger);
    if day2.values().all(|r| r.qc.is_none()) && finished == Err(EngineError::GameFinished) {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}
