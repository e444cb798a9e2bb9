use crate::error::CoreError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A three-letter currency code such as `EUR`.
///
/// Ordering is lexical on the code, which is what ranking tie-breaks rely on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::InvalidInput(
                "currency".to_string(),
                format!("'{}' is not a three-letter currency code", s),
            ));
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One weekly positioning report for one currency future.
///
/// Fields are private so that every instance has passed validation: open
/// interest is non-negative and the net position cannot exceed it in
/// magnitude. Identity is `(currency, report_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReportFields")]
pub struct PositioningReport {
    currency: CurrencyCode,
    report_date: NaiveDate,
    net_position: i64,
    open_interest: i64,
}

#[derive(Deserialize)]
struct ReportFields {
    currency: CurrencyCode,
    report_date: NaiveDate,
    net_position: i64,
    open_interest: i64,
}

impl TryFrom<ReportFields> for PositioningReport {
    type Error = CoreError;

    fn try_from(f: ReportFields) -> Result<Self, Self::Error> {
        Self::new(f.currency, f.report_date, f.net_position, f.open_interest)
    }
}

impl PositioningReport {
    pub fn new(
        currency: CurrencyCode,
        report_date: NaiveDate,
        net_position: i64,
        open_interest: i64,
    ) -> Result<Self, CoreError> {
        if open_interest < 0 {
            return Err(CoreError::InvalidInput(
                "open_interest".to_string(),
                format!("{} {}: negative open interest {}", currency, report_date, open_interest),
            ));
        }
        if net_position.unsigned_abs() > open_interest.unsigned_abs() {
            return Err(CoreError::InvalidInput(
                "net_position".to_string(),
                format!(
                    "{} {}: |net position| {} exceeds open interest {}",
                    currency, report_date, net_position, open_interest
                ),
            ));
        }
        Ok(Self {
            currency,
            report_date,
            net_position,
            open_interest,
        })
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn report_date(&self) -> NaiveDate {
        self.report_date
    }

    pub fn net_position(&self) -> i64 {
        self.net_position
    }

    pub fn open_interest(&self) -> i64 {
        self.open_interest
    }
}

/// Where the current net position sits inside its trailing window, 0..=100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResult {
    pub currency: CurrencyCode,
    pub report_date: NaiveDate,
    pub window_size: usize,
    pub index_value: Decimal,
    pub current_net_position: i64,
    /// Lowest net position in the window.
    pub window_low: i64,
    /// Highest net position in the window.
    pub window_high: i64,
}

impl IndexResult {
    /// `hi - lo` of the window, the default scale for momentum.
    ///
    /// Net positions span the whole `i64` range, so the difference is taken
    /// as a Decimal.
    pub fn window_span(&self) -> Decimal {
        Decimal::from(self.window_high) - Decimal::from(self.window_low)
    }
}

/// Statistics over week-over-week changes of the net position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaStats {
    pub delta_current: Decimal,
    pub delta_average: Decimal,
    pub percentile_25: Decimal,
    pub percentile_75: Decimal,
}

/// How far the current net position has moved away from its recent baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentumResult {
    pub currency: CurrencyCode,
    pub report_date: NaiveDate,
    pub baseline_window: usize,
    pub baseline_average: Decimal,
    /// `current_net_position - baseline_average`, in contracts.
    pub momentum_value: Decimal,
    pub current_net_position: i64,
    pub open_interest: i64,
    pub delta_stats: Option<DeltaStats>,
}

/// Weighted combination of centred index and scaled momentum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub currency: CurrencyCode,
    pub index_value: Decimal,
    pub momentum_value: Decimal,
    pub weight_index: Decimal,
    pub weight_momentum: Decimal,
    /// The divisor applied to `momentum_value` before weighting.
    pub momentum_scale: Decimal,
    pub score: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn currency_code_is_normalized_to_uppercase() {
        let code: CurrencyCode = " eur ".parse().unwrap();
        assert_eq!(code.as_str(), "EUR");
    }

    #[test]
    fn currency_code_rejects_bad_input() {
        assert!("EURO".parse::<CurrencyCode>().is_err());
        assert!("E1R".parse::<CurrencyCode>().is_err());
        assert!("".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn currency_codes_order_alphabetically() {
        let mut codes: Vec<CurrencyCode> = ["USD", "AUD", "EUR"]
            .iter()
            .map(|c| c.parse().unwrap())
            .collect();
        codes.sort();
        let sorted: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(sorted, vec!["AUD", "EUR", "USD"]);
    }

    #[test]
    fn report_rejects_negative_open_interest() {
        let err = PositioningReport::new("EUR".parse().unwrap(), date(2024, 1, 2), 0, -1)
            .unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::MalformedRecord);
    }

    #[test]
    fn report_rejects_net_position_larger_than_open_interest() {
        assert!(
            PositioningReport::new("EUR".parse().unwrap(), date(2024, 1, 2), -500, 400).is_err()
        );
        assert!(
            PositioningReport::new("EUR".parse().unwrap(), date(2024, 1, 2), -400, 400).is_ok()
        );
    }

    #[test]
    fn window_span_covers_the_full_net_position_range() {
        let result = IndexResult {
            currency: "EUR".parse().unwrap(),
            report_date: date(2024, 1, 2),
            window_size: 2,
            index_value: Decimal::ONE_HUNDRED,
            current_net_position: i64::MAX,
            window_low: -i64::MAX,
            window_high: i64::MAX,
        };
        assert_eq!(result.window_span(), Decimal::from(i64::MAX) * Decimal::TWO);
    }

    #[test]
    fn deserializing_a_report_runs_validation() {
        let ok = r#"{"currency":"jpy","report_date":"2024-01-02","net_position":-10,"open_interest":100}"#;
        let report: PositioningReport = serde_json::from_str(ok).unwrap();
        assert_eq!(report.currency().as_str(), "JPY");

        let bad = r#"{"currency":"JPY","report_date":"2024-01-02","net_position":-10,"open_interest":-1}"#;
        assert!(serde_json::from_str::<PositioningReport>(bad).is_err());
    }
}
