//! # Positioning Engine
//!
//! Wires the ingestor, the report store, the calculators and the score
//! aggregator together, and owns the two result caches.
//!
//! - `ingest` / `refresh` / `backfill` pull reports from upstream into the store.
//! - `evaluate` / `rankings` / `latest_score` compute from what is stored.
//!
//! Work over several currencies fans out with a concurrency limit, and one
//! currency failing never aborts the others.

use crate::cache::{CacheKey, TtlCache};
use crate::error::EngineError;
use analytics::{IndexCalculator, MomentumCalculator};
use analyzer::{CurrencyAnalysis, CurrencyOutcome, IncompleteEntry, Ranking, ScoreAggregator};
use api_client::{Ingestor, PositioningSource};
use chrono::NaiveDate;
use configuration::Config;
use core_types::{CompositeScore, CurrencyCode, FailureKind, PositioningReport};
use database::{AppendOutcome, ReportStore};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;

pub mod cache;
pub mod error;

pub use cache::CacheSlot;

/// What happened to the store when a report was ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestStatus {
    Inserted,
    Updated,
    /// Served from the fetch cache; the report was already appended.
    Cached,
}

impl From<AppendOutcome> for IngestStatus {
    fn from(outcome: AppendOutcome) -> Self {
        match outcome {
            AppendOutcome::Inserted => IngestStatus::Inserted,
            AppendOutcome::Updated => IngestStatus::Updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ingested {
    pub report: PositioningReport,
    pub status: IngestStatus,
}

/// Per-currency results of a `refresh`, in currency order.
#[derive(Debug)]
pub struct RefreshSummary {
    pub as_of: NaiveDate,
    pub outcomes: Vec<(CurrencyCode, Result<Ingested, EngineError>)>,
}

impl RefreshSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&CurrencyCode, &EngineError)> {
        self.outcomes
            .iter()
            .filter_map(|(currency, result)| result.as_ref().err().map(|e| (currency, e)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// The central orchestrator of the positioning analytics.
pub struct PositioningEngine {
    store: Arc<dyn ReportStore>,
    ingestor: Ingestor,
    index: IndexCalculator,
    momentum: MomentumCalculator,
    aggregator: ScoreAggregator,
    currencies: Vec<CurrencyCode>,
    max_concurrency: usize,
    history_weeks: usize,
    fetch_cache: TtlCache<CacheKey, PositioningReport>,
    analysis_cache: TtlCache<CacheKey, CurrencyAnalysis>,
}

impl PositioningEngine {
    /// Builds an engine from a validated configuration.
    pub fn new(
        config: &Config,
        store: Arc<dyn ReportStore>,
        source: Arc<dyn PositioningSource>,
    ) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;

        let analytics = &config.analytics;
        let mut currencies = config.engine.currencies.clone();
        currencies.sort();
        currencies.dedup();

        Ok(Self {
            store,
            ingestor: Ingestor::new(source, &config.upstream),
            index: IndexCalculator::new(analytics.index_window, analytics.min_index_window)?,
            momentum: MomentumCalculator::new(analytics.baseline_window)?
                .with_delta_lookback(analytics.index_window),
            aggregator: ScoreAggregator::new(&config.scoring)?,
            currencies,
            max_concurrency: config.engine.max_concurrency,
            history_weeks: config.engine.history_weeks,
            fetch_cache: TtlCache::new(config.cache.ttl),
            analysis_cache: TtlCache::new(config.cache.ttl),
        })
    }

    /// The tracked currencies, in code order.
    pub fn currencies(&self) -> &[CurrencyCode] {
        &self.currencies
    }

    pub fn is_tracked(&self, currency: &CurrencyCode) -> bool {
        self.currencies.binary_search(currency).is_ok()
    }

    fn ensure_tracked(&self, currency: &CurrencyCode) -> Result<(), EngineError> {
        if self.is_tracked(currency) {
            Ok(())
        } else {
            Err(EngineError::NotTracked(currency.clone()))
        }
    }

    // ============================================
    // Ingestion
    // ============================================

    /// Fetches the report in effect on `as_of` and appends it to the store.
    ///
    /// A fetch for the same currency and date within the cache TTL is served
    /// from the cache without touching upstream or the store.
    pub async fn ingest(
        &self,
        currency: &CurrencyCode,
        as_of: NaiveDate,
    ) -> Result<Ingested, EngineError> {
        self.ensure_tracked(currency)?;
        let key = CacheKey::on(currency, as_of);
        if let Some(report) = self.fetch_cache.get(&key).await {
            tracing::debug!(%currency, %as_of, "Serving report from the fetch cache.");
            return Ok(Ingested {
                report,
                status: IngestStatus::Cached,
            });
        }

        let report = self.ingestor.fetch(currency, as_of).await?;
        let outcome = self
            .store
            .append(&report)
            .await
            .map_err(EngineError::Storage)?;
        self.fetch_cache.insert(key, report.clone()).await;

        tracing::info!(
            %currency,
            report_date = %report.report_date(),
            outcome = ?outcome,
            "Stored positioning report."
        );
        Ok(Ingested {
            report,
            status: outcome.into(),
        })
    }

    /// Ingests every tracked currency as of `as_of`.
    pub async fn refresh(&self, as_of: NaiveDate) -> RefreshSummary {
        self.refresh_with(as_of, |_, _| {}).await
    }

    /// Like `refresh`, calling `observer` as each currency completes.
    pub async fn refresh_with<F>(&self, as_of: NaiveDate, observer: F) -> RefreshSummary
    where
        F: Fn(&CurrencyCode, &Result<Ingested, EngineError>),
    {
        let mut outcomes: Vec<(CurrencyCode, Result<Ingested, EngineError>)> =
            stream::iter(self.currencies.iter().cloned())
                .map(|currency| async move {
                    let result = self.ingest(&currency, as_of).await;
                    (currency, result)
                })
                .buffer_unordered(self.max_concurrency)
                .inspect(|(currency, result)| observer(currency, result))
                .collect()
                .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        let summary = RefreshSummary { as_of, outcomes };
        for (currency, err) in summary.failed() {
            tracing::warn!(%currency, kind = %err.kind(), error = %err, "Refresh failed for currency.");
        }
        tracing::info!(
            %as_of,
            succeeded = summary.succeeded(),
            total = summary.outcomes.len(),
            "Refresh finished."
        );
        summary
    }

    /// Loads up to `weeks` reports ending at `as_of` into the store. Defaults
    /// to the configured history length.
    pub async fn backfill(
        &self,
        currency: &CurrencyCode,
        as_of: NaiveDate,
        weeks: Option<usize>,
    ) -> Result<BackfillSummary, EngineError> {
        self.ensure_tracked(currency)?;
        let weeks = weeks.unwrap_or(self.history_weeks);
        if weeks == 0 {
            return Err(EngineError::InvalidRequest(
                "backfill needs at least one week".to_string(),
            ));
        }

        let history = self.ingestor.fetch_history(currency, as_of, weeks).await?;
        let mut summary = BackfillSummary {
            fetched: history.len(),
            ..BackfillSummary::default()
        };
        for report in &history {
            match self.store.append(report).await.map_err(EngineError::Storage)? {
                AppendOutcome::Inserted => summary.inserted += 1,
                AppendOutcome::Updated => summary.updated += 1,
            }
        }

        tracing::info!(
            %currency,
            fetched = summary.fetched,
            inserted = summary.inserted,
            updated = summary.updated,
            "Backfill finished."
        );
        Ok(summary)
    }

    /// Backfills every tracked currency, calling `observer` as each completes.
    pub async fn backfill_all<F>(
        &self,
        as_of: NaiveDate,
        weeks: Option<usize>,
        observer: F,
    ) -> Vec<(CurrencyCode, Result<BackfillSummary, EngineError>)>
    where
        F: Fn(&CurrencyCode, &Result<BackfillSummary, EngineError>),
    {
        let mut outcomes: Vec<_> = stream::iter(self.currencies.iter().cloned())
            .map(|currency| async move {
                let result = self.backfill(&currency, as_of, weeks).await;
                (currency, result)
            })
            .buffer_unordered(self.max_concurrency)
            .inspect(|(currency, result)| observer(currency, result))
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        outcomes
    }

    // ============================================
    // Evaluation
    // ============================================

    /// Computes index, momentum, signal and composite score from the most
    /// recent stored reports.
    ///
    /// With fewer stored reports than the index window, but at least its
    /// minimum, the calculation runs over every report available.
    pub async fn evaluate(&self, currency: &CurrencyCode) -> Result<CurrencyAnalysis, EngineError> {
        self.ensure_tracked(currency)?;
        let key = CacheKey::latest(currency);
        if let Some(analysis) = self.analysis_cache.get(&key).await {
            return Ok(analysis);
        }

        let available = self
            .store
            .count(currency)
            .await
            .map_err(EngineError::Storage)?;
        let required = self.index.min_window().max(self.momentum.required_reports());
        if available < required {
            return Err(EngineError::InsufficientData {
                currency: currency.clone(),
                required,
                available,
            });
        }

        // One report beyond the index window gives momentum a full window of
        // week-over-week deltas; the index only reads its trailing `window`.
        let size = available.min(self.index.window() + 1);
        let window = self
            .store
            .window(currency, size)
            .await
            .map_err(|e| EngineError::from_window_read(currency, e))?;

        let index = self.index.calculate(&window)?;
        let momentum = self.momentum.calculate(&window)?;
        let analysis = self.aggregator.analyze(index, momentum)?;

        tracing::debug!(
            %currency,
            window_size = analysis.index.window_size,
            score = %analysis.score.score,
            "Evaluated currency."
        );
        self.analysis_cache.insert(key, analysis.clone()).await;
        Ok(analysis)
    }

    /// Evaluates every tracked currency and ranks the ones that succeeded.
    pub async fn rankings(&self) -> Ranking {
        let outcomes: Vec<CurrencyOutcome> = stream::iter(self.currencies.iter().cloned())
            .map(|currency| async move {
                match self.evaluate(&currency).await {
                    Ok(analysis) => CurrencyOutcome::Complete(analysis),
                    Err(err) => CurrencyOutcome::Incomplete(IncompleteEntry {
                        currency,
                        kind: err.kind(),
                        message: err.to_string(),
                    }),
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        self.aggregator.rank(outcomes)
    }

    /// The latest composite score of one currency.
    pub async fn latest_score(&self, currency: &CurrencyCode) -> Result<CompositeScore, EngineError> {
        self.evaluate(currency).await.map(|analysis| analysis.score)
    }

    /// Stored reports with `from <= report_date <= to`, ascending.
    pub async fn reports(
        &self,
        currency: &CurrencyCode,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PositioningReport>, EngineError> {
        self.ensure_tracked(currency)?;
        if from > to {
            return Err(EngineError::InvalidRequest(format!(
                "range start {} is after range end {}",
                from, to
            )));
        }
        self.store
            .range(currency, from, to)
            .await
            .map_err(EngineError::Storage)
    }

    /// The newest stored report of one currency.
    pub async fn latest_report(&self, currency: &CurrencyCode) -> Result<PositioningReport, EngineError> {
        self.ensure_tracked(currency)?;
        match self.store.latest(currency).await {
            Ok(report) => Ok(report),
            Err(err) if err.kind() == FailureKind::DataNotFound => {
                Err(EngineError::NoReports(currency.clone()))
            }
            Err(err) => Err(EngineError::Storage(err)),
        }
    }

    /// Drops expired entries from both caches.
    pub async fn purge_caches(&self) -> usize {
        let purged = self.fetch_cache.purge_expired().await + self.analysis_cache.purge_expired().await;
        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache entries.");
        }
        purged
    }
}
