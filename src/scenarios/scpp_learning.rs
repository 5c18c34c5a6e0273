/// Self-play training run for the SCPP learner: one SCPP bidder against a
/// shaded marginal-value bidder and a random bidder over many second-price
/// rounds.
///
/// Validates that the learner's price model actually moves toward the rival
/// bids it observes (all below 20 CPM here) and that bidding expected
/// marginal values against the learned model is safe in a second-price
/// auction: the SCPP bidder ends with strictly positive utility.

use std::rc::Rc;

use rand::{rngs::StdRng, SeedableRng};

use crate::bidders::{BidderTrait, MarginalValueBidder, RandomBidder, ScppBidder, ScppConfig};
use crate::goods::{good_set, GoodSet, ValuationFn};
use crate::logger::{LogEvent, Logger};
use crate::series::AuctionSeries;
use crate::utils::get_seed;
use crate::logln;
use crate::errln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "scpp",
    run,
});

const NUM_ROUNDS: usize = 100;
const PRICE_UPPER_BOUND: f64 = 50.0;

fn scpp_valuation(bundle: &GoodSet) -> f64 {
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

fn rival_valuation(bundle: &GoodSet) -> f64 {
    bundle
        .iter()
        .map(|good| match good.as_str() {
            "a" => 10.0,
            "b" => 15.0,
            "c" => 20.0,
            _ => 0.0,
        })
        .sum()
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let goods = good_set(&["a", "b", "c"]);

    let scpp_config = ScppConfig {
        upper_bound: PRICE_UPPER_BOUND,
        ..ScppConfig::default()
    };
    let fresh_total = crate::histogram::PriceHistogram::new(
        scpp_config.bucket_size,
        scpp_config.upper_bound,
    )
    .total();

    let entries: Vec<(Box<dyn BidderTrait>, Rc<dyn ValuationFn>)> = vec![
        (
            Box::new(ScppBidder::new("scpp", scpp_config)),
            Rc::new(scpp_valuation),
        ),
        (
            Box::new(MarginalValueBidder::new("shaded", 0.9)),
            Rc::new(rival_valuation),
        ),
        (
            Box::new(RandomBidder::new("random", 1.0, 20.0)),
            Rc::new(rival_valuation),
        ),
    ];

    logln!(logger, LogEvent::Variant, "\n=== SCPP self-play: {} rounds, second price ===", NUM_ROUNDS);
    let mut series = AuctionSeries::new(goods.clone(), 2, entries);
    let mut rng = StdRng::seed_from_u64(get_seed(71));
    let stats = series.run(NUM_ROUNDS, &mut rng, logger)?;
    stats.printout(&series.bidders, logger, LogEvent::Variant);

    logln!(logger, LogEvent::Scenario, "");

    let mut errors = Vec::new();

    // Check: truthful expected-marginal-value bidding never loses money in a
    // second-price auction
    let msg = format!(
        "SCPP utility is strictly positive: {:.2} > 0",
        stats.agent_stats[0].total_utility
    );
    if stats.agent_stats[0].total_utility > 0.0 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    // Check: the SCPP bidder values every good above both rivals' bids, so
    // it should win the whole universe every round
    let total_goods = NUM_ROUNDS * goods.len();
    let msg = format!(
        "SCPP wins every good: {} == {}",
        stats.agent_stats[0].goods_won, total_goods
    );
    if stats.agent_stats[0].goods_won == total_goods {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    // Pull the learned model back out of the series for distribution checks
    let scpp_bidder = series.bidders[0]
        .as_any()
        .downcast_ref::<ScppBidder>()
        .expect("agent 0 is the SCPP bidder");
    let learned_model = scpp_bidder.learned_model().expect("setup ran");

    // Check: ten observation windows were blended in, so the learned
    // histogram carries more weight than a fresh one
    let learned_total = learned_model.histogram("a").expect("good exists").total();
    let msg = format!(
        "Learned histogram gained weight from observations: {:.2} > {:.2}",
        learned_total, fresh_total
    );
    if learned_total > fresh_total {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "{}", msg);
    }

    // Check: rival bids never exceed 20 CPM, so the learned distribution
    // must lean well below the midpoint of its [0, 50) range
    let mut sample_rng = StdRng::seed_from_u64(get_seed(72));
    let num_samples = 400;
    let below_half = (0..num_samples)
        .filter(|_| learned_model.sample(&mut sample_rng)["a"] < PRICE_UPPER_BOUND / 2.0)
        .count();
    let fraction = below_half as f64 / num_samples as f64;
    let msg = format!(
        "Learned model concentrates below observed rival ceiling: {:.2} of samples under {:.0}",
        fraction,
        PRICE_UPPER_BOUND / 2.0
    );
    if fraction > 0.55 {
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
