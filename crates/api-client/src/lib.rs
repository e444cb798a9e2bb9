use crate::error::ApiError;
use async_trait::async_trait;
use chrono::NaiveDate;
use configuration::UpstreamSettings;
use core_types::CurrencyCode;
use reqwest::header::{HeaderMap, HeaderValue};

pub mod error;
pub mod ingestor;
pub mod responses;

// --- Public API ---
pub use ingestor::Ingestor;
pub use responses::RawCotRow;

/// The abstract interface for an upstream source of positioning reports.
///
/// The ingestor only talks to this trait, so the CFTC client can be swapped
/// for a scripted source in tests.
#[async_trait]
pub trait PositioningSource: Send + Sync {
    /// Fetches up to `limit` raw rows for `currency` dated on or before
    /// `as_of`, newest first. An empty vector means the upstream has nothing.
    async fn fetch_rows(
        &self,
        currency: &CurrencyCode,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<RawCotRow>, ApiError>;
}

const SELECTED_COLUMNS: &str = "report_date_as_yyyy_mm_dd,noncomm_positions_long_all,noncomm_positions_short_all,open_interest_all";

/// A `PositioningSource` backed by the CFTC public reporting (Socrata) API.
#[derive(Clone)]
pub struct CftcClient {
    client: reqwest::Client,
    base_url: String,
    settings: UpstreamSettings,
}

impl CftcClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &settings.app_token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| ApiError::InvalidData(format!("invalid app token: {}", e)))?;
            headers.insert("X-App-Token", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            settings: settings.clone(),
        })
    }

    async fn fetch_contract(
        &self,
        contract_name: &str,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<RawCotRow>, ApiError> {
        let where_clause = format!(
            "market_and_exchange_names = '{}' AND report_date_as_yyyy_mm_dd <= '{}T00:00:00.000'",
            escape_soql(contract_name),
            as_of.format("%Y-%m-%d")
        );
        let limit = limit.to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("$where", where_clause.as_str()),
                ("$order", "report_date_as_yyyy_mm_dd DESC"),
                ("$limit", limit.as_str()),
                ("$select", SELECTED_COLUMNS),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(ApiError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(ApiError::Rejected(status.as_u16(), text));
        }

        Ok(response.json::<Vec<RawCotRow>>().await?)
    }
}

#[async_trait]
impl PositioningSource for CftcClient {
    async fn fetch_rows(
        &self,
        currency: &CurrencyCode,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<RawCotRow>, ApiError> {
        let contracts = self.settings.contracts_for(currency);
        if contracts.is_empty() {
            return Err(ApiError::NotFound(format!(
                "no contract market configured for {}",
                currency
            )));
        }

        // The CFTC has renamed contracts over the years; take the first name that answers.
        for contract_name in contracts {
            let rows = self.fetch_contract(contract_name, as_of, limit).await?;
            if !rows.is_empty() {
                tracing::debug!(%currency, contract = %contract_name, rows = rows.len(), "Fetched positioning rows.");
                return Ok(rows);
            }
            tracing::debug!(%currency, contract = %contract_name, "No rows for contract name, trying the next one.");
        }

        Ok(Vec::new())
    }
}

/// Escapes a literal for use inside single quotes in a SoQL expression.
fn escape_soql(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soql_literals_escape_single_quotes() {
        assert_eq!(escape_soql("EURO FX"), "EURO FX");
        assert_eq!(escape_soql("O'HARE"), "O''HARE");
    }

    #[tokio::test]
    async fn unknown_currency_is_not_found_without_a_request() {
        let client = CftcClient::new(&UpstreamSettings::default()).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let err = client
            .fetch_rows(&"NZD".parse().unwrap(), as_of, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), core_types::FailureKind::DataNotFound);
    }
}
