use crate::error::ApiError;
use crate::responses::RawCotRow;
use crate::PositioningSource;
use chrono::{Datelike, NaiveDate, Weekday};
use configuration::UpstreamSettings;
use core_types::{CurrencyCode, PositioningReport};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Turns raw upstream rows into validated `PositioningReport`s.
///
/// Every request is bounded by a timeout and a network failure is retried
/// exactly once after a short backoff. Missing data and malformed rows are
/// surfaced immediately. The ingestor never writes to a store.
#[derive(Clone)]
pub struct Ingestor {
    source: Arc<dyn PositioningSource>,
    timeout: Duration,
    retry_backoff: Duration,
    release_weekday: Weekday,
    max_report_age: chrono::Duration,
}

impl Ingestor {
    pub fn new(source: Arc<dyn PositioningSource>, settings: &UpstreamSettings) -> Self {
        Self {
            source,
            timeout: settings.timeout,
            retry_backoff: settings.retry_backoff,
            release_weekday: settings.release_weekday,
            max_report_age: chrono::Duration::from_std(settings.max_report_age)
                .unwrap_or_else(|_| chrono::Duration::days(10)),
        }
    }

    /// Fetches the report in effect on `as_of`: the newest report dated on or
    /// before it, provided it is not older than the configured maximum age.
    pub async fn fetch(
        &self,
        currency: &CurrencyCode,
        as_of: NaiveDate,
    ) -> Result<PositioningReport, ApiError> {
        let rows = self.fetch_rows_with_retry(currency, as_of, 1).await?;
        let row = rows.into_iter().next().ok_or_else(|| {
            ApiError::NotFound(format!("no report for {} on or before {}", currency, as_of))
        })?;

        let report = self.normalize(currency, &row)?;
        if report.report_date() > as_of {
            return Err(ApiError::InvalidData(format!(
                "{}: upstream returned report dated {} for a request as of {}",
                currency,
                report.report_date(),
                as_of
            )));
        }
        if as_of - report.report_date() > self.max_report_age {
            return Err(ApiError::NotFound(format!(
                "{}: newest report is dated {}, too old for {}",
                currency,
                report.report_date(),
                as_of
            )));
        }

        tracing::info!(
            %currency,
            report_date = %report.report_date(),
            net_position = report.net_position(),
            "Fetched positioning report."
        );
        Ok(report)
    }

    /// Fetches up to `weeks` reports ending at `as_of`, ascending by date.
    ///
    /// Rows that fail validation are skipped and logged. If every row is
    /// invalid the call fails with the first validation error.
    pub async fn fetch_history(
        &self,
        currency: &CurrencyCode,
        as_of: NaiveDate,
        weeks: usize,
    ) -> Result<Vec<PositioningReport>, ApiError> {
        let rows = self.fetch_rows_with_retry(currency, as_of, weeks).await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(format!(
                "no reports for {} on or before {}",
                currency, as_of
            )));
        }

        let mut by_date = BTreeMap::new();
        let mut first_error = None;
        let mut skipped = 0usize;
        for row in &rows {
            match self.normalize(currency, row) {
                Ok(report) if report.report_date() <= as_of => {
                    by_date.entry(report.report_date()).or_insert(report);
                }
                Ok(report) => {
                    skipped += 1;
                    tracing::warn!(%currency, report_date = %report.report_date(), "Skipping report dated after the requested date.");
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(%currency, error = %e, "Skipping malformed positioning row.");
                    first_error.get_or_insert(e);
                }
            }
        }

        if by_date.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                ApiError::NotFound(format!("no usable reports for {} before {}", currency, as_of))
            }));
        }
        if skipped > 0 {
            tracing::warn!(%currency, skipped, kept = by_date.len(), "Some history rows were discarded.");
        }

        Ok(by_date.into_values().collect())
    }

    /// Validates one raw row and builds the canonical report.
    pub fn normalize(
        &self,
        currency: &CurrencyCode,
        row: &RawCotRow,
    ) -> Result<PositioningReport, ApiError> {
        let report_date = row.parse_report_date()?;
        if report_date.weekday() != self.release_weekday {
            return Err(ApiError::InvalidData(format!(
                "{}: report date {} is a {:?}, expected {:?}",
                currency,
                report_date,
                report_date.weekday(),
                self.release_weekday
            )));
        }

        let long_contracts = row.parse_long_contracts()?;
        let short_contracts = row.parse_short_contracts()?;
        let open_interest = row.parse_open_interest()?;

        PositioningReport::new(
            currency.clone(),
            report_date,
            long_contracts - short_contracts,
            open_interest,
        )
        .map_err(|e| ApiError::InvalidData(e.to_string()))
    }

    async fn fetch_rows_with_retry(
        &self,
        currency: &CurrencyCode,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<RawCotRow>, ApiError> {
        match self.fetch_rows_once(currency, as_of, limit).await {
            Err(e) if e.kind().is_retryable() => {
                tracing::warn!(
                    %currency,
                    error = %e,
                    backoff_ms = self.retry_backoff.as_millis() as u64,
                    "Upstream fetch failed, retrying once."
                );
                tokio::time::sleep(self.retry_backoff).await;
                self.fetch_rows_once(currency, as_of, limit).await
            }
            other => other,
        }
    }

    async fn fetch_rows_once(
        &self,
        currency: &CurrencyCode,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<RawCotRow>, ApiError> {
        tokio::time::timeout(self.timeout, self.source.fetch_rows(currency, as_of, limit))
            .await
            .map_err(|_| ApiError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_types::FailureKind;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ============================================
    // Scripted upstream
    // ============================================

    enum Step {
        Rows(Vec<RawCotRow>),
        Unavailable,
        Rejected,
        Hang,
    }

    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PositioningSource for ScriptedSource {
        async fn fetch_rows(
            &self,
            _currency: &CurrencyCode,
            _as_of: NaiveDate,
            _limit: usize,
        ) -> Result<Vec<RawCotRow>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Rows(rows)) => Ok(rows),
                Some(Step::Unavailable) => Err(ApiError::Unavailable("HTTP 503".to_string())),
                Some(Step::Rejected) => Err(ApiError::Rejected(400, "bad query".to_string())),
                Some(Step::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
                None => Ok(Vec::new()),
            }
        }
    }

    fn row(date: &str, long: i64, short: i64, open_interest: i64) -> RawCotRow {
        RawCotRow {
            report_date: Some(json!(format!("{}T00:00:00.000", date))),
            long_contracts: Some(json!(long.to_string())),
            short_contracts: Some(json!(short.to_string())),
            open_interest: Some(json!(open_interest.to_string())),
        }
    }

    fn ingestor(source: Arc<ScriptedSource>) -> Ingestor {
        Ingestor::new(source, &UpstreamSettings::default())
    }

    fn eur() -> CurrencyCode {
        "EUR".parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // ============================================
    // Validation
    // ============================================

    #[tokio::test]
    async fn fetch_builds_net_position_from_long_and_short() {
        let source = ScriptedSource::new(vec![Step::Rows(vec![row("2024-03-05", 250_000, 120_000, 700_000)])]);
        let report = ingestor(source).fetch(&eur(), date("2024-03-08")).await.unwrap();

        assert_eq!(report.report_date(), date("2024-03-05"));
        assert_eq!(report.net_position(), 130_000);
        assert_eq!(report.open_interest(), 700_000);
    }

    #[tokio::test]
    async fn report_off_the_release_weekday_is_malformed() {
        // 2024-03-06 is a Wednesday.
        let source = ScriptedSource::new(vec![Step::Rows(vec![row("2024-03-06", 10, 5, 100)])]);
        let err = ingestor(source).fetch(&eur(), date("2024-03-08")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedRecord);
    }

    #[tokio::test]
    async fn negative_open_interest_is_malformed() {
        let source = ScriptedSource::new(vec![Step::Rows(vec![row("2024-03-05", 10, 5, -1)])]);
        let err = ingestor(source).fetch(&eur(), date("2024-03-08")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedRecord);
    }

    #[tokio::test]
    async fn empty_upstream_answer_is_not_found() {
        let source = ScriptedSource::new(vec![Step::Rows(vec![])]);
        let err = ingestor(source).fetch(&eur(), date("2024-03-08")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::DataNotFound);
    }

    #[tokio::test]
    async fn stale_report_is_not_found() {
        let source = ScriptedSource::new(vec![Step::Rows(vec![row("2024-02-06", 10, 5, 100)])]);
        let err = ingestor(source).fetch(&eur(), date("2024-03-08")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::DataNotFound);
    }

    // ============================================
    // Retry policy
    // ============================================

    #[tokio::test(start_paused = true)]
    async fn network_error_is_retried_once() {
        let source = ScriptedSource::new(vec![
            Step::Unavailable,
            Step::Rows(vec![row("2024-03-05", 10, 5, 100)]),
        ]);
        let report = ingestor(source.clone()).fetch(&eur(), date("2024-03-05")).await.unwrap();

        assert_eq!(report.net_position(), 5);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_network_error_is_surfaced() {
        let source = ScriptedSource::new(vec![Step::Unavailable, Step::Unavailable, Step::Rows(vec![])]);
        let err = ingestor(source.clone()).fetch(&eur(), date("2024-03-05")).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::NetworkError);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_and_rejections_are_not_retried() {
        let source = ScriptedSource::new(vec![Step::Rows(vec![])]);
        ingestor(source.clone()).fetch(&eur(), date("2024-03-05")).await.unwrap_err();
        assert_eq!(source.calls(), 1);

        let source = ScriptedSource::new(vec![Step::Rejected]);
        let err = ingestor(source.clone()).fetch(&eur(), date("2024-03-05")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedRecord);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_request_times_out_and_is_retried() {
        let source = ScriptedSource::new(vec![Step::Hang, Step::Hang]);
        let err = ingestor(source.clone()).fetch(&eur(), date("2024-03-05")).await.unwrap_err();

        assert!(matches!(err, ApiError::Timeout(_)));
        assert_eq!(source.calls(), 2);
    }

    // ============================================
    // History
    // ============================================

    #[tokio::test]
    async fn history_is_ascending_and_skips_bad_rows() {
        let source = ScriptedSource::new(vec![Step::Rows(vec![
            row("2024-03-05", 30, 0, 100),
            row("2024-02-28", 99, 0, 100), // Wednesday
            row("2024-02-27", 20, 0, 100),
            row("2024-02-20", 10, 0, 100),
        ])]);
        let history = ingestor(source)
            .fetch_history(&eur(), date("2024-03-05"), 4)
            .await
            .unwrap();

        let nets: Vec<i64> = history.iter().map(|r| r.net_position()).collect();
        assert_eq!(nets, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn history_with_only_bad_rows_is_malformed() {
        let source = ScriptedSource::new(vec![Step::Rows(vec![row("2024-02-28", 1, 0, 10)])]);
        let err = ingestor(source)
            .fetch_history(&eur(), date("2024-03-05"), 4)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedRecord);
    }
}
