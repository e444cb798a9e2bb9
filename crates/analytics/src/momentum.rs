use crate::check_window;
use crate::error::AnalyticsError;
use core_types::{DeltaStats, MomentumResult, PositioningReport};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

/// Measures how far the latest net position has moved from its recent
/// baseline: the mean of the `baseline` reports immediately before it.
///
/// The value is a raw signed difference in contracts. Scaling it to be
/// comparable with the index is left to the score aggregator.
#[derive(Debug, Clone, Copy)]
pub struct MomentumCalculator {
    baseline: usize,
    delta_lookback: Option<usize>,
}

impl MomentumCalculator {
    pub fn new(baseline: usize) -> Result<Self, AnalyticsError> {
        if baseline == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "momentum baseline must cover at least one report".to_string(),
            ));
        }
        Ok(Self {
            baseline,
            delta_lookback: None,
        })
    }

    /// Limits the delta percentiles to the most recent `lookback` changes.
    /// Without a limit every change in the window counts.
    pub fn with_delta_lookback(mut self, lookback: usize) -> Self {
        self.delta_lookback = Some(lookback.max(1));
        self
    }

    pub fn baseline(&self) -> usize {
        self.baseline
    }

    /// The fewest reports a window may hold.
    pub fn required_reports(&self) -> usize {
        self.baseline + 1
    }

    pub fn calculate(
        &self,
        reports: &[PositioningReport],
    ) -> Result<MomentumResult, AnalyticsError> {
        if reports.len() < self.required_reports() {
            return Err(AnalyticsError::InsufficientData {
                required: self.required_reports(),
                available: reports.len(),
            });
        }
        check_window(reports)?;

        let (current, earlier) = match reports.split_last() {
            Some(split) => split,
            None => {
                return Err(AnalyticsError::InsufficientData {
                    required: self.required_reports(),
                    available: 0,
                });
            }
        };
        let baseline_reports = &earlier[earlier.len() - self.baseline..];
        let baseline_sum: Decimal = baseline_reports.iter().map(net_position).sum();
        let baseline_average = baseline_sum / Decimal::from(self.baseline);
        let momentum_value = Decimal::from(current.net_position()) - baseline_average;

        tracing::debug!(
            currency = %current.currency(),
            %baseline_average,
            %momentum_value,
            "Computed positioning momentum."
        );

        Ok(MomentumResult {
            currency: current.currency().clone(),
            report_date: current.report_date(),
            baseline_window: self.baseline,
            baseline_average,
            momentum_value,
            current_net_position: current.net_position(),
            open_interest: current.open_interest(),
            delta_stats: self.delta_stats(reports),
        })
    }

    /// Week-over-week change statistics, when the window holds at least
    /// `baseline + 2` reports.
    ///
    /// Percentile thresholds are whole contracts, truncated toward zero.
    fn delta_stats(&self, reports: &[PositioningReport]) -> Option<DeltaStats> {
        if reports.len() < self.baseline + 2 {
            return None;
        }
        let deltas: Vec<Decimal> = reports
            .windows(2)
            .map(|pair| net_position(&pair[1]) - net_position(&pair[0]))
            .collect();
        let (&delta_current, previous) = deltas.split_last()?;

        let recent = &previous[previous.len().saturating_sub(self.baseline)..];
        let delta_average = recent.iter().sum::<Decimal>() / Decimal::from(recent.len());

        let lookback = self.delta_lookback.unwrap_or(deltas.len());
        let mut sorted = deltas[deltas.len().saturating_sub(lookback)..].to_vec();
        sorted.sort_unstable();

        Some(DeltaStats {
            delta_current,
            delta_average,
            percentile_25: percentile(&sorted, dec!(25)).trunc(),
            percentile_75: percentile(&sorted, dec!(75)).trunc(),
        })
    }
}

fn net_position(report: &PositioningReport) -> Decimal {
    Decimal::from(report.net_position())
}

/// Linear-interpolation percentile of an ascending, non-empty slice.
fn percentile(sorted: &[Decimal], p: Decimal) -> Decimal {
    let last = sorted.len().saturating_sub(1);
    let rank = p / dec!(100) * Decimal::from(last);
    let lower = rank.floor();
    let fraction = rank - lower;
    let lower = lower.to_usize().unwrap_or(0).min(last);
    let upper = (lower + 1).min(last);

    let low_value = sorted.get(lower).copied().unwrap_or_default();
    let high_value = sorted.get(upper).copied().unwrap_or_default();
    low_value + (high_value - low_value) * fraction
}
