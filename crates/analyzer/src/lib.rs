use crate::error::AnalyzerError;
use analytics::PositioningSignal;
use configuration::{MomentumScale, ScoreWeights, ScoringSettings};
use core_types::{CompositeScore, CurrencyCode, FailureKind, IndexResult, MomentumResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::cmp::Ordering;

pub mod error;
pub mod table;

pub use table::format_ranking;

/// Everything computed for one currency: both sub-results, the discrete
/// signal and the composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyAnalysis {
    pub index: IndexResult,
    pub momentum: MomentumResult,
    pub signal: PositioningSignal,
    pub score: CompositeScore,
}

impl CurrencyAnalysis {
    pub fn currency(&self) -> &CurrencyCode {
        &self.score.currency
    }
}

/// A currency left out of a ranking, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteEntry {
    pub currency: CurrencyCode,
    pub kind: FailureKind,
    pub message: String,
}

/// The per-currency input to `ScoreAggregator::rank`.
#[derive(Debug, Clone)]
pub enum CurrencyOutcome {
    Complete(CurrencyAnalysis),
    Incomplete(IncompleteEntry),
}

/// Currencies ordered by composite score, plus the ones that could not be scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ranking {
    pub ranked: Vec<CurrencyAnalysis>,
    pub incomplete: Vec<IncompleteEntry>,
}

impl Ranking {
    pub fn analysis_for(&self, currency: &CurrencyCode) -> Option<&CurrencyAnalysis> {
        self.ranked.iter().find(|a| a.currency() == currency)
    }

    pub fn score_for(&self, currency: &CurrencyCode) -> Option<&CompositeScore> {
        self.analysis_for(currency).map(|a| &a.score)
    }

    /// 1-based position of `currency` in the ranking.
    pub fn position_of(&self, currency: &CurrencyCode) -> Option<usize> {
        self.ranked
            .iter()
            .position(|a| a.currency() == currency)
            .map(|i| i + 1)
    }
}

/// Combines index and momentum into a composite score and ranks currencies.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    weights: ScoreWeights,
    momentum_scale: MomentumScale,
}

impl ScoreAggregator {
    /// Creates an aggregator from the scoring section of the configuration.
    /// The configured weights are normalized once, here.
    pub fn new(settings: &ScoringSettings) -> Result<Self, AnalyzerError> {
        Ok(Self {
            weights: settings.weights().normalized()?,
            momentum_scale: settings.momentum_scale,
        })
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// `weight_index * (index - 50) + weight_momentum * (momentum / scale)`.
    ///
    /// `weights` are normalized to sum to 1. A zero scale contributes no
    /// momentum at all.
    pub fn score(
        &self,
        currency: &CurrencyCode,
        index: &IndexResult,
        momentum: &MomentumResult,
        weights: &ScoreWeights,
    ) -> Result<CompositeScore, AnalyzerError> {
        for other in [&index.currency, &momentum.currency] {
            if other != currency {
                return Err(AnalyzerError::MismatchedResults {
                    index: index.currency.clone(),
                    momentum: momentum.currency.clone(),
                });
            }
        }
        let weights = weights.normalized()?;

        let momentum_scale = match self.momentum_scale {
            MomentumScale::WindowSpan => index.window_span(),
            MomentumScale::OpenInterest => Decimal::from(momentum.open_interest),
            MomentumScale::Fixed(scale) => scale,
        };
        let scaled_momentum = if momentum_scale.is_zero() {
            Decimal::ZERO
        } else {
            momentum.momentum_value / momentum_scale
        };

        let score = weights.weight_index * (index.index_value - dec!(50))
            + weights.weight_momentum * scaled_momentum;

        Ok(CompositeScore {
            currency: currency.clone(),
            index_value: index.index_value,
            momentum_value: momentum.momentum_value,
            weight_index: weights.weight_index,
            weight_momentum: weights.weight_momentum,
            momentum_scale,
            score,
        })
    }

    /// Scores one currency with the configured weights and classifies its signal.
    pub fn analyze(
        &self,
        index: IndexResult,
        momentum: MomentumResult,
    ) -> Result<CurrencyAnalysis, AnalyzerError> {
        let score = self.score(&index.currency, &index, &momentum, &self.weights)?;
        let signal = PositioningSignal::classify(&index, &momentum);
        Ok(CurrencyAnalysis {
            index,
            momentum,
            signal,
            score,
        })
    }

    /// Orders complete analyses by score, highest first, with ties going to
    /// the alphabetically earlier currency. Incomplete currencies are listed
    /// separately and never given a default score.
    pub fn rank(&self, outcomes: impl IntoIterator<Item = CurrencyOutcome>) -> Ranking {
        let mut ranking = Ranking::default();
        for outcome in outcomes {
            match outcome {
                CurrencyOutcome::Complete(analysis) => ranking.ranked.push(analysis),
                CurrencyOutcome::Incomplete(entry) => {
                    tracing::warn!(
                        currency = %entry.currency,
                        kind = %entry.kind,
                        "Currency excluded from ranking: {}",
                        entry.message
                    );
                    ranking.incomplete.push(entry);
                }
            }
        }
        ranking.ranked.sort_by(|a, b| compare_scores(&a.score, &b.score));
        ranking.incomplete.sort_by(|a, b| a.currency.cmp(&b.currency));
        ranking
    }
}

/// Ranking order: descending score, then ascending currency code.
pub fn compare_scores(a: &CompositeScore, b: &CompositeScore) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.currency.cmp(&b.currency))
}
