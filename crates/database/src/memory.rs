use crate::DbError;
use crate::repository::{AppendOutcome, ReportStore, check_range, check_window_size};
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{CurrencyCode, PositioningReport};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// A `ReportStore` that keeps every series in process memory.
///
/// Each series is a `BTreeMap` keyed by report date, which gives the
/// one-report-per-date and ascending-order guarantees for free. Used by the
/// tests and for offline runs without a database.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    series: RwLock<HashMap<CurrencyCode, BTreeMap<NaiveDate, PositioningReport>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn append(&self, report: &PositioningReport) -> Result<AppendOutcome, DbError> {
        let mut series = self.series.write().await;
        let previous = series
            .entry(report.currency().clone())
            .or_default()
            .insert(report.report_date(), report.clone());
        Ok(match previous {
            Some(_) => AppendOutcome::Updated,
            None => AppendOutcome::Inserted,
        })
    }

    async fn window(
        &self,
        currency: &CurrencyCode,
        n: usize,
    ) -> Result<Vec<PositioningReport>, DbError> {
        check_window_size(n)?;
        let series = self.series.read().await;
        let available = series.get(currency).map_or(0, BTreeMap::len);
        if available < n {
            return Err(DbError::InsufficientData {
                currency: currency.to_string(),
                requested: n,
                available,
            });
        }
        let reports = series
            .get(currency)
            .map(|s| s.values().skip(available - n).cloned().collect())
            .unwrap_or_default();
        Ok(reports)
    }

    async fn latest(&self, currency: &CurrencyCode) -> Result<PositioningReport, DbError> {
        let series = self.series.read().await;
        series
            .get(currency)
            .and_then(|s| s.values().next_back())
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn range(
        &self,
        currency: &CurrencyCode,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PositioningReport>, DbError> {
        check_range(from, to)?;
        let series = self.series.read().await;
        Ok(series
            .get(currency)
            .map(|s| s.range(from..=to).map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    async fn count(&self, currency: &CurrencyCode) -> Result<usize, DbError> {
        Ok(self.series.read().await.get(currency).map_or(0, BTreeMap::len))
    }

    async fn currencies(&self) -> Result<Vec<CurrencyCode>, DbError> {
        let series = self.series.read().await;
        let mut codes: Vec<CurrencyCode> = series
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(code, _)| code.clone())
            .collect();
        codes.sort();
        Ok(codes)
    }
}
