use crate::error::ApiError;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

/// One row of the CFTC legacy futures-only report, as returned by Socrata.
///
/// Socrata encodes every number as a string, but nothing guarantees it, so
/// the fields are kept as raw JSON values and coerced on access.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCotRow {
    #[serde(rename = "report_date_as_yyyy_mm_dd")]
    pub report_date: Option<Value>,
    /// Non-commercial long contracts.
    #[serde(rename = "noncomm_positions_long_all")]
    pub long_contracts: Option<Value>,
    /// Non-commercial short contracts.
    #[serde(rename = "noncomm_positions_short_all")]
    pub short_contracts: Option<Value>,
    #[serde(rename = "open_interest_all")]
    pub open_interest: Option<Value>,
}

impl RawCotRow {
    /// Parses `2024-01-02T00:00:00.000` or a bare `2024-01-02`.
    pub fn parse_report_date(&self) -> Result<NaiveDate, ApiError> {
        let raw = match &self.report_date {
            Some(Value::String(s)) => s.trim(),
            Some(other) => {
                return Err(ApiError::InvalidData(format!(
                    "report date is not a string: {}",
                    other
                )));
            }
            None => return Err(ApiError::InvalidData("missing report date".to_string())),
        };
        let date_part = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|e| ApiError::InvalidData(format!("invalid report date '{}': {}", raw, e)))
    }

    pub fn parse_long_contracts(&self) -> Result<i64, ApiError> {
        parse_count("noncomm_positions_long_all", self.long_contracts.as_ref())
    }

    pub fn parse_short_contracts(&self) -> Result<i64, ApiError> {
        parse_count("noncomm_positions_short_all", self.short_contracts.as_ref())
    }

    pub fn parse_open_interest(&self) -> Result<i64, ApiError> {
        parse_count("open_interest_all", self.open_interest.as_ref())
    }
}

/// Coerces a contract count to a non-negative integer.
///
/// Accepts JSON integers, integral floats, and strings of either (thousands
/// separators allowed).
fn parse_count(field: &str, value: Option<&Value>) -> Result<i64, ApiError> {
    let value = value.ok_or_else(|| ApiError::InvalidData(format!("missing field {}", field)))?;
    let count = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<i64>().ok().or_else(|| {
                cleaned
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    };
    let count = count.ok_or_else(|| {
        ApiError::InvalidData(format!("field {} is not an integer: {}", field, value))
    })?;
    if count < 0 {
        return Err(ApiError::InvalidData(format!(
            "field {} is negative: {}",
            field, count
        )));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_a_socrata_row() {
        let row: RawCotRow = serde_json::from_value(json!({
            "report_date_as_yyyy_mm_dd": "2024-03-05T00:00:00.000",
            "noncomm_positions_long_all": "245,118",
            "noncomm_positions_short_all": "120000",
            "open_interest_all": 701234
        }))
        .unwrap();

        assert_eq!(
            row.parse_report_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
        assert_eq!(row.parse_long_contracts().unwrap(), 245_118);
        assert_eq!(row.parse_short_contracts().unwrap(), 120_000);
        assert_eq!(row.parse_open_interest().unwrap(), 701_234);
    }

    #[test]
    fn integral_floats_are_accepted() {
        let row = RawCotRow {
            open_interest: Some(json!("1500.0")),
            long_contracts: Some(json!(12.0)),
            ..Default::default()
        };
        assert_eq!(row.parse_open_interest().unwrap(), 1500);
        assert_eq!(row.parse_long_contracts().unwrap(), 12);
    }

    #[test]
    fn missing_garbled_or_negative_counts_are_invalid() {
        let row = RawCotRow {
            long_contracts: Some(json!("n/a")),
            short_contracts: Some(json!(-3)),
            open_interest: Some(json!(1.5)),
            ..Default::default()
        };
        assert!(row.parse_long_contracts().is_err());
        assert!(row.parse_short_contracts().is_err());
        assert!(row.parse_open_interest().is_err());
        assert!(row.parse_report_date().is_err());
    }

    #[test]
    fn bare_dates_parse_and_junk_does_not() {
        let bare = RawCotRow {
            report_date: Some(json!("2024-03-05")),
            ..Default::default()
        };
        assert!(bare.parse_report_date().is_ok());

        let junk = RawCotRow {
            report_date: Some(json!("03/05/2024")),
            ..Default::default()
        };
        assert!(junk.parse_report_date().is_err());
    }
}
