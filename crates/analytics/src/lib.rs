//! # Positioning Analytics
//!
//! Pure calculators that turn a window of weekly positioning reports into
//! derived signals.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** The crate has no knowledge of storage or transport. It
//!   depends only on `core-types`.
//! - **Stateless calculation:** `IndexCalculator` and `MomentumCalculator`
//!   hold only their window parameters. They read an immutable slice of
//!   reports and return a result, so many currencies can be evaluated at once.
//!
//! ## Public API
//!
//! - `IndexCalculator`: where the latest net position sits within its window, 0..=100.
//! - `MomentumCalculator`: the latest net position against its recent baseline.
//! - `PositioningSignal`: the discrete -2..=+2 bias read off both results.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

pub mod error;
pub mod index;
pub mod momentum;
pub mod signal;

pub use error::AnalyticsError;
pub use index::IndexCalculator;
pub use momentum::MomentumCalculator;
pub use signal::{Direction, Intensity, PositioningSignal, Side};

use core_types::PositioningReport;

/// Checks that a window holds one currency in strictly ascending date order.
pub(crate) fn check_window(reports: &[PositioningReport]) -> Result<(), AnalyticsError> {
    let Some(first) = reports.first() else {
        return Ok(());
    };
    for pair in reports.windows(2) {
        if pair[1].currency() != first.currency() {
            return Err(AnalyticsError::MalformedWindow(format!(
                "window mixes {} and {}",
                first.currency(),
                pair[1].currency()
            )));
        }
        if pair[1].report_date() <= pair[0].report_date() {
            return Err(AnalyticsError::MalformedWindow(format!(
                "{}: report dates are not strictly ascending ({} then {})",
                first.currency(),
                pair[0].report_date(),
                pair[1].report_date()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate};
    use core_types::PositioningReport;

    /// One report per week starting 2024-01-02, with the given net positions.
    pub fn series(currency: &str, nets: &[i64]) -> Vec<PositioningReport> {
        series_with_open_interest(currency, nets, 1_000_000)
    }

    pub fn series_with_open_interest(
        currency: &str,
        nets: &[i64],
        open_interest: i64,
    ) -> Vec<PositioningReport> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        nets.iter()
            .enumerate()
            .map(|(i, net)| {
                PositioningReport::new(
                    currency.parse().unwrap(),
                    start + Duration::weeks(i as i64),
                    *net,
                    open_interest,
                )
                .unwrap()
            })
            .collect()
    }
}
