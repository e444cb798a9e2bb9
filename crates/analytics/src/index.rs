use crate::check_window;
use crate::error::AnalyticsError;
use core_types::{IndexResult, PositioningReport};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Locates the latest net position within the range of its trailing window.
///
/// `0` means the current position is the lowest of the window, `100` the
/// highest. A window whose positions never moved reads as a neutral `50`.
#[derive(Debug, Clone, Copy)]
pub struct IndexCalculator {
    window: usize,
    min_window: usize,
}

impl IndexCalculator {
    pub const NEUTRAL: Decimal = dec!(50);

    /// Creates a calculator over a trailing window of `window` reports that
    /// refuses to compute with fewer than `min_window`.
    pub fn new(window: usize, min_window: usize) -> Result<Self, AnalyticsError> {
        if min_window == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "minimum index window must be at least 1".to_string(),
            ));
        }
        if window < min_window {
            return Err(AnalyticsError::InvalidParameter(format!(
                "index window {} is below the minimum of {}",
                window, min_window
            )));
        }
        Ok(Self { window, min_window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn min_window(&self) -> usize {
        self.min_window
    }

    /// Computes the index of the most recent report in `reports`.
    ///
    /// Only the last `window` reports are considered. A shorter slice is
    /// accepted as long as it holds at least `min_window` reports, and the
    /// result records the size actually used.
    pub fn calculate(&self, reports: &[PositioningReport]) -> Result<IndexResult, AnalyticsError> {
        if reports.len() < self.min_window {
            return Err(AnalyticsError::InsufficientData {
                required: self.min_window,
                available: reports.len(),
            });
        }
        let window = &reports[reports.len().saturating_sub(self.window)..];
        check_window(window)?;

        let Some(current) = window.last() else {
            return Err(AnalyticsError::InsufficientData {
                required: self.min_window,
                available: 0,
            });
        };
        let v = current.net_position();
        let lo = window.iter().map(PositioningReport::net_position).min().unwrap_or(v);
        let hi = window.iter().map(PositioningReport::net_position).max().unwrap_or(v);

        let index_value = if hi == lo {
            Self::NEUTRAL
        } else {
            let (v, lo, hi) = (Decimal::from(v), Decimal::from(lo), Decimal::from(hi));
            let raw = (v - lo) * dec!(100) / (hi - lo);
            raw.clamp(Decimal::ZERO, dec!(100))
        };

        tracing::debug!(
            currency = %current.currency(),
            window_size = window.len(),
            %index_value,
            "Computed positioning index."
        );

        Ok(IndexResult {
            currency: current.currency().clone(),
            report_date: current.report_date(),
            window_size: window.len(),
            index_value,
            current_net_position: v,
            window_low: lo,
            window_high: hi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{series, series_with_open_interest};
    use core_types::FailureKind;

    fn calculator() -> IndexCalculator {
        IndexCalculator::new(52, 10).unwrap()
    }

    #[test]
    fn linear_rise_ends_at_one_hundred() {
        // 52 weekly reports from 1000 to 6000.
        let nets: Vec<i64> = (0..52).map(|i| 1000 + i * 5000 / 51).collect();
        assert_eq!(*nets.last().unwrap(), 6000);

        let result = calculator().calculate(&series("EUR", &nets)).unwrap();

        assert_eq!(result.index_value, dec!(100));
        assert_eq!(result.window_size, 52);
        assert_eq!(result.window_low, 1000);
        assert_eq!(result.window_high, 6000);
    }

    #[test]
    fn current_at_the_low_is_exactly_zero() {
        let nets: Vec<i64> = (0..20).rev().map(|i| i * 100 - 500).collect();
        let result = calculator().calculate(&series("GBP", &nets)).unwrap();
        assert_eq!(result.index_value, Decimal::ZERO);
    }

    #[test]
    fn flat_window_is_neutral() {
        let result = calculator().calculate(&series("JPY", &[-2500; 15])).unwrap();
        assert_eq!(result.index_value, dec!(50));
        assert_eq!(result.window_span(), Decimal::ZERO);
    }

    #[test]
    fn mid_range_value_is_proportional() {
        let mut nets = vec![0; 9];
        nets.push(1000);
        nets.push(250);
        let result = calculator().calculate(&series("CHF", &nets)).unwrap();
        assert_eq!(result.index_value, dec!(25));
    }

    #[test]
    fn nine_reports_against_a_minimum_of_ten_is_insufficient() {
        let err = calculator().calculate(&series("AUD", &[1; 9])).unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::InsufficientData {
                required: 10,
                available: 9
            }
        );
        assert_eq!(err.kind(), FailureKind::InsufficientData);
    }

    #[test]
    fn only_the_trailing_window_is_used() {
        // An early spike outside the window must not affect the range.
        let mut nets = vec![1_000_000];
        nets.extend((0..12).map(|i| i * 10));
        let calc = IndexCalculator::new(12, 10).unwrap();

        let result = calc.calculate(&series("CAD", &nets)).unwrap();

        assert_eq!(result.window_size, 12);
        assert_eq!(result.window_high, 110);
        assert_eq!(result.index_value, dec!(100));
    }

    #[test]
    fn short_history_above_the_minimum_reports_its_real_size() {
        let result = calculator().calculate(&series("USD", &[5; 30])).unwrap();
        assert_eq!(result.window_size, 30);
    }

    #[test]
    fn index_stays_within_bounds_for_varied_windows() {
        let calc = IndexCalculator::new(20, 10).unwrap();
        for seed in 1..40i64 {
            let nets: Vec<i64> = (0..25).map(|i| ((i * 7919 + seed * 104_729) % 2001) - 1000).collect();
            let value = calc.calculate(&series("EUR", &nets)).unwrap().index_value;
            assert!(value >= Decimal::ZERO && value <= dec!(100), "out of bounds: {}", value);
        }
    }

    #[test]
    fn extreme_net_positions_do_not_overflow() {
        let max = i64::MAX;
        let mut nets = vec![-max; 9];
        nets.push(max);
        let result = calculator()
            .calculate(&series_with_open_interest("EUR", &nets, max))
            .unwrap();

        assert_eq!(result.index_value, dec!(100));
        assert_eq!(result.window_low, -max);

        nets.push(0);
        let result = calculator()
            .calculate(&series_with_open_interest("EUR", &nets, max))
            .unwrap();
        assert_eq!(result.index_value, dec!(50));
    }

    #[test]
    fn mixed_currencies_are_rejected() {
        let mut reports = series("EUR", &[1; 10]);
        reports.extend(series("GBP", &[1; 11]).into_iter().skip(10));
        let err = calculator().calculate(&reports).unwrap_err();
        assert!(matches!(err, AnalyticsError::MalformedWindow(_)));
    }

    #[test]
    fn unordered_window_is_rejected() {
        let mut reports = series("EUR", &(0..12).collect::<Vec<_>>());
        reports.swap(3, 4);
        let err = calculator().calculate(&reports).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedRecord);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        assert!(IndexCalculator::new(52, 0).is_err());
        assert!(IndexCalculator::new(5, 10).is_err());
        assert!(IndexCalculator::new(10, 10).is_ok());
    }
}
