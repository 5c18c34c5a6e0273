use std::f64::consts::PI;

/// Quality score for a campaign's day-1 reach performance.
///
/// Monotonic S-curve in the reach ratio, centered so that hitting exactly
/// 70% of the reach goal scores about 0.5:
///
///   qc = 0.5 + 0.5 * (2/pi) * atan(4 * (reach/goal - 0.7))
///
/// The result stays inside [0, 1] for all non-negative inputs. A zero reach
/// goal is a degenerate campaign and scores 0. The score is computed exactly
/// once at the day-1 boundary and carried into day 2 as a pure multiplier;
/// the engine itself never rescales bids or limits with it - that is the
/// caller's pre-scaling step.
pub fn quality_score(reach: u32, goal: u32) -> f64 {
    if goal == 0 {
        return 0.0;
    }
    let ratio = reach as f64 / goal as f64;
    0.5 + 0.5 * (2.0 / PI) * (4.0 * (ratio - 0.7)).atan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_reach_scores_below_half() {
        assert!(quality_score(0, 1000) < 0.5);
    }

    #[test]
    fn test_full_reach_scores_above_half() {
        assert!(quality_score(1000, 1000) > 0.5);
    }

    #[test]
    fn test_seventy_percent_is_the_center() {
        let qc = quality_score(700, 1000);
        assert!((qc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_non_decreasing_in_reach() {
        let mut previous = quality_score(0, 1000);
        for reach in (100..=3000).step_by(100) {
            let current = quality_score(reach, 1000);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_bounded_to_unit_interval() {
        for reach in [0, 1, 500, 700, 1000, 10_000, 1_000_000] {
            let qc = quality_score(reach, 1000);
            assert!((0.0..=1.0).contains(&qc), "qc {} out of bounds", qc);
        }
    }

    #[test]
    fn test_degenerate_goal_scores_zero() {
        assert_eq!(quality_score(500, 0), 0.0);
    }
}
