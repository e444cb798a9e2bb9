use core_types::{IndexResult, MomentumResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;

/// How stretched positioning is, read from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Intensity {
    /// Index above 70.
    High,
    /// Index from 30 to 70 inclusive.
    Medium,
    /// Index below 30.
    Low,
}

impl Intensity {
    pub fn from_index(index_value: Decimal) -> Self {
        if index_value > dec!(70) {
            Intensity::High
        } else if index_value >= dec!(30) {
            Intensity::Medium
        } else {
            Intensity::Low
        }
    }
}

/// Whether this week's change is unusually large either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Current weekly change above the 75th percentile.
    Accelerating,
    Steady,
    /// Current weekly change below the 25th percentile.
    Decelerating,
}

impl Direction {
    pub fn from_momentum(momentum: &MomentumResult) -> Self {
        match &momentum.delta_stats {
            Some(stats) if stats.delta_current > stats.percentile_75 => {
                Direction::Accelerating
            }
            Some(stats) if stats.delta_current < stats.percentile_25 => {
                Direction::Decelerating
            }
            _ => Direction::Steady,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Long,
    Short,
}

/// A discrete -2..=+2 read of speculative positioning.
///
/// Informational only: it is shown next to the composite score and never
/// feeds into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositioningSignal {
    pub score: i8,
    pub intensity: Intensity,
    pub direction: Direction,
    pub side: Side,
    pub label: &'static str,
}

impl PositioningSignal {
    pub fn classify(index: &IndexResult, momentum: &MomentumResult) -> Self {
        let intensity = Intensity::from_index(index.index_value);
        let direction = Direction::from_momentum(momentum);
        // A flat book counts as short.
        let side = if momentum.current_net_position > 0 {
            Side::Long
        } else {
            Side::Short
        };

        use Direction::*;
        use Intensity::*;
        let (score, label) = match (side, intensity, direction) {
            (Side::Long, High, Accelerating) => (2, "Strong long, buying accelerates"),
            (Side::Long, High, Steady) => (1, "Strong long, holding"),
            (Side::Long, High, Decelerating) => (0, "Strong long, being sold"),
            (Side::Long, Medium, Accelerating) => (1, "Long building"),
            (Side::Long, Medium, Steady) => (0, "Moderate long, steady"),
            (Side::Long, Medium, Decelerating) => (-1, "Longs being closed"),
            (Side::Long, Low, Accelerating) => (1, "Rebuilding longs"),
            (Side::Long, Low, Steady) => (0, "Weak long, steady"),
            (Side::Long, Low, Decelerating) => (-1, "Longs exhausting"),
            (Side::Short, Low, Decelerating) => (-2, "Strong short, selling accelerates"),
            (Side::Short, Low, Steady) => (-1, "Strong short, holding"),
            (Side::Short, Low, Accelerating) => (0, "Strong short, being bought"),
            (Side::Short, Medium, Decelerating) => (-1, "Short building"),
            (Side::Short, Medium, Steady) => (0, "Moderate short, steady"),
            (Side::Short, Medium, Accelerating) => (1, "Shorts being closed"),
            (Side::Short, High, Decelerating) => (-1, "Rebuilding shorts"),
            (Side::Short, High, Steady) => (0, "Weak short, steady"),
            (Side::Short, High, Accelerating) => (1, "Shorts exhausting"),
        };

        Self {
            score,
            intensity,
            direction,
            side,
            label,
        }
    }
}

impl fmt::Display for PositioningSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+} ({})", self.score, self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::DeltaStats;

    fn index(value: Decimal) -> IndexResult {
        IndexResult {
            currency: "EUR".parse().unwrap(),
            report_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            window_size: 52,
            index_value: value,
            current_net_position: 0,
            window_low: -100,
            window_high: 100,
        }
    }

    fn momentum(net: i64, delta_current: Option<i64>) -> MomentumResult {
        MomentumResult {
            currency: "EUR".parse().unwrap(),
            report_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            baseline_window: 4,
            baseline_average: Decimal::ZERO,
            momentum_value: Decimal::ZERO,
            current_net_position: net,
            open_interest: 1_000,
            delta_stats: delta_current.map(|delta_current| DeltaStats {
                delta_current: Decimal::from(delta_current),
                delta_average: Decimal::ZERO,
                percentile_25: dec!(-10),
                percentile_75: dec!(10),
            }),
        }
    }

    #[test]
    fn intensity_thresholds() {
        assert_eq!(Intensity::from_index(dec!(70.1)), Intensity::High);
        assert_eq!(Intensity::from_index(dec!(70)), Intensity::Medium);
        assert_eq!(Intensity::from_index(dec!(30)), Intensity::Medium);
        assert_eq!(Intensity::from_index(dec!(29.9)), Intensity::Low);
    }

    #[test]
    fn extremes_of_the_table() {
        let strongest = PositioningSignal::classify(&index(dec!(90)), &momentum(500, Some(50)));
        assert_eq!(strongest.score, 2);
        assert_eq!(strongest.side, Side::Long);
        assert_eq!(strongest.direction, Direction::Accelerating);

        let weakest = PositioningSignal::classify(&index(dec!(10)), &momentum(-500, Some(-50)));
        assert_eq!(weakest.score, -2);
        assert_eq!(weakest.side, Side::Short);
    }

    #[test]
    fn reversals_score_against_the_side() {
        let longs_closing = PositioningSignal::classify(&index(dec!(50)), &momentum(500, Some(-50)));
        assert_eq!(longs_closing.score, -1);

        let shorts_exhausting = PositioningSignal::classify(&index(dec!(80)), &momentum(-500, Some(50)));
        assert_eq!(shorts_exhausting.score, 1);
    }

    #[test]
    fn missing_delta_stats_read_as_steady() {
        let signal = PositioningSignal::classify(&index(dec!(90)), &momentum(500, None));
        assert_eq!(signal.direction, Direction::Steady);
        assert_eq!(signal.score, 1);
        assert_eq!(signal.to_string(), "+1 (Strong long, holding)");
    }

    #[test]
    fn changes_inside_the_quartiles_are_steady() {
        let signal = PositioningSignal::classify(&index(dec!(50)), &momentum(0, Some(10)));
        assert_eq!(signal.direction, Direction::Steady);
        assert_eq!(signal.side, Side::Short);
        assert_eq!(signal.score, 0);
    }
}
