use std::fs;

use plotters::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use crate::quality::quality_score;
use crate::rival::RivalPriceTable;

/// Generate all diagnostic charts into the charts/ directory
pub fn generate_all_charts() -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all("charts")?;
    generate_rival_cpm_histogram()?;
    generate_quality_score_chart()?;
    Ok(())
}

/// Sample 10000 rival prices from the default table's first segment and
/// render them as a 100-bucket histogram.
///
/// Useful for eyeballing the Beta(2,5)-shaped CPM distribution the AdX
/// micro-auctions run against.
fn generate_rival_cpm_histogram() -> Result<(), Box<dyn std::error::Error>> {
    let table = RivalPriceTable::default_seeded(42);
    let mut rng = StdRng::seed_from_u64(42);

    let mut prices = Vec::with_capacity(10_000);
    for _ in 0..10_000 {
        prices.push(table.sample(0, &mut rng));
    }

    let min_price = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_price = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    const NUM_BINS: usize = 100;
    let bin_width = (max_price - min_price) / NUM_BINS as f64;
    let mut bins = vec![0u32; NUM_BINS];
    for &price in &prices {
        let bin_idx = ((price - min_price) / bin_width).floor() as usize;
        let bin_idx = bin_idx.min(NUM_BINS - 1);
        bins[bin_idx] += 1;
    }
    let max_count = *bins.iter().max().unwrap_or(&1);

    let filepath = "charts/rival_cpm_histogram.png";
    let root = BitMapBackend::new(filepath, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Rival CPM Distribution (segment 0)", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(min_price..max_price, 0u32..max_count + max_count / 10)?;

    chart.configure_mesh()
        .x_desc("Rival CPM")
        .y_desc("Count")
        .draw()?;

    chart.draw_series(bins.iter().enumerate().map(|(i, &count)| {
        let x0 = min_price + i as f64 * bin_width;
        let x1 = x0 + bin_width;
        Rectangle::new([(x0, 0), (x1, count)], BLUE.filled())
    }))?;

    root.present()?;
    println!("Generated: {}", filepath);
    Ok(())
}

/// Render the quality-score S-curve over reach ratios from 0% to 200% of the
/// goal, with the 70%-of-goal center visible at qc = 0.5
fn generate_quality_score_chart() -> Result<(), Box<dyn std::error::Error>> {
    const GOAL: u32 = 1000;
    let num_points = 1000;

    let mut points = Vec::with_capacity(num_points);
    for i in 0..num_points {
        let reach = (2 * GOAL) as f64 * (i as f64) / (num_points as f64 - 1.0);
        let ratio = reach / GOAL as f64;
        points.push((ratio, quality_score(reach as u32, GOAL)));
    }

    let filepath = "charts/quality_score.png";
    let root = BitMapBackend::new(filepath, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Quality Score vs Reach Ratio", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..2.0, 0.0..1.0)?;

    chart.configure_mesh()
        .x_desc("reach / goal")
        .y_desc("quality score")
        .draw()?;

    chart.draw_series(LineSeries::new(points, &BLUE))?;

    // Mark the curve's center at 70% of goal
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.7, 0.0), (0.7, 1.0)],
        &BLACK,
    )))?;

    root.present()?;
    println!("Generated: {}", filepath);
    Ok(())
}
