use crate::error::ConfigError;
use chrono::Weekday;
use core_types::CurrencyCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so an empty `config.toml` is a valid
/// configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Config {
    /// Checks the cross-field rules that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.currencies.is_empty() {
            return Err(ConfigError::ValidationError(
                "engine.currencies must list at least one currency".to_string(),
            ));
        }
        if self.engine.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.analytics.min_index_window == 0 {
            return Err(ConfigError::ValidationError(
                "analytics.min_index_window must be at least 1".to_string(),
            ));
        }
        if self.analytics.index_window < self.analytics.min_index_window {
            return Err(ConfigError::ValidationError(format!(
                "analytics.index_window ({}) is below analytics.min_index_window ({})",
                self.analytics.index_window, self.analytics.min_index_window
            )));
        }
        if self.analytics.baseline_window == 0 {
            return Err(ConfigError::ValidationError(
                "analytics.baseline_window must be at least 1".to_string(),
            ));
        }
        self.scoring.weights().normalized()?;
        if let MomentumScale::Fixed(scale) = self.scoring.momentum_scale {
            if scale <= Decimal::ZERO {
                return Err(ConfigError::ValidationError(
                    "scoring.momentum_scale fixed value must be positive".to_string(),
                ));
            }
        }
        if self.cache.ttl.is_zero() {
            return Err(ConfigError::ValidationError(
                "cache.ttl must be greater than zero".to_string(),
            ));
        }
        if self.upstream.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "upstream.timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which currencies are tracked and how much work runs at once.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub currencies: Vec<CurrencyCode>,
    /// Upper bound on concurrent per-currency fetches and evaluations.
    pub max_concurrency: usize,
    /// How many weeks `backfill` requests when no count is given.
    pub history_weeks: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            currencies: ["USD", "EUR", "GBP", "JPY", "CHF", "AUD", "CAD"]
                .iter()
                .filter_map(|c| c.parse().ok())
                .collect(),
            max_concurrency: 4,
            history_weeks: 60,
        }
    }
}

/// The upstream positioning-report source (CFTC public reporting API).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub base_url: String,
    /// Bounded timeout for a single request.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Pause before the single retry of a failed request.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    /// Optional Socrata application token, sent as `X-App-Token`.
    pub app_token: Option<String>,
    /// The weekday every report is dated on.
    pub release_weekday: Weekday,
    /// The newest report older than this, relative to the requested date, is
    /// treated as missing. Covers the lag between report date and publication.
    #[serde(with = "humantime_serde")]
    pub max_report_age: Duration,
    /// Contract market names per currency, tried in order.
    pub contracts: BTreeMap<String, Vec<String>>,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        let contracts = [
            (
                "EUR",
                vec!["EURO FX - CHICAGO MERCANTILE EXCHANGE", "EURO FX"],
            ),
            (
                "GBP",
                vec![
                    "BRITISH POUND STERLING - CHICAGO MERCANTILE EXCHANGE",
                    "BRITISH POUND",
                    "BRITISH POUND STERLING",
                ],
            ),
            (
                "JPY",
                vec!["JAPANESE YEN - CHICAGO MERCANTILE EXCHANGE", "JAPANESE YEN"],
            ),
            (
                "CHF",
                vec!["SWISS FRANC - CHICAGO MERCANTILE EXCHANGE", "SWISS FRANC"],
            ),
            (
                "AUD",
                vec![
                    "AUSTRALIAN DOLLAR - CHICAGO MERCANTILE EXCHANGE",
                    "AUSTRALIAN DOLLAR",
                ],
            ),
            (
                "CAD",
                vec![
                    "CANADIAN DOLLAR - CHICAGO MERCANTILE EXCHANGE",
                    "CANADIAN DOLLAR",
                ],
            ),
            (
                "USD",
                vec![
                    "USD INDEX - ICE FUTURES U.S.",
                    "U.S. DOLLAR INDEX - ICE FUTURES U.S.",
                    "US DOLLAR INDEX",
                ],
            ),
        ]
        .into_iter()
        .map(|(code, names)| {
            (
                code.to_string(),
                names.into_iter().map(String::from).collect(),
            )
        })
        .collect();

        Self {
            base_url: "https://publicreporting.cftc.gov/resource/6dca-aqww.json".to_string(),
            timeout: Duration::from_secs(20),
            retry_backoff: Duration::from_millis(500),
            app_token: None,
            release_weekday: Weekday::Tue,
            max_report_age: Duration::from_secs(10 * 24 * 60 * 60),
            contracts,
        }
    }
}

impl UpstreamSettings {
    /// Contract names for a currency, or an empty slice if none are configured.
    pub fn contracts_for(&self, currency: &CurrencyCode) -> &[String] {
        self.contracts
            .get(currency.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Window lengths for the index and momentum calculations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    /// Trailing window of the index, in weekly reports (about one year).
    pub index_window: usize,
    /// Below this many reports the index is not computed.
    pub min_index_window: usize,
    /// Reports preceding the latest that form the momentum baseline.
    pub baseline_window: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            index_window: 52,
            min_index_window: 10,
            baseline_window: 4,
        }
    }
}

/// How momentum is brought to a magnitude comparable with the centred index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumScale {
    /// `hi - lo` of the index window.
    #[default]
    WindowSpan,
    /// Open interest of the current report.
    OpenInterest,
    /// A fixed divisor.
    Fixed(Decimal),
}

/// Composite score weights.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub weight_index: Decimal,
    pub weight_momentum: Decimal,
    pub momentum_scale: MomentumScale,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weight_index: dec!(0.5),
            weight_momentum: dec!(0.5),
            momentum_scale: MomentumScale::WindowSpan,
        }
    }
}

impl ScoringSettings {
    pub fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            weight_index: self.weight_index,
            weight_momentum: self.weight_momentum,
        }
    }
}

/// A pair of non-negative weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    pub weight_index: Decimal,
    pub weight_momentum: Decimal,
}

impl ScoreWeights {
    /// Returns the weights rescaled to sum to 1.
    ///
    /// Negative weights, or two zero weights, cannot be normalized.
    pub fn normalized(&self) -> Result<ScoreWeights, ConfigError> {
        if self.weight_index < Decimal::ZERO || self.weight_momentum < Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "score weights must be non-negative (index {}, momentum {})",
                self.weight_index, self.weight_momentum
            )));
        }
        let total = self.weight_index + self.weight_momentum;
        if total.is_zero() {
            return Err(ConfigError::ValidationError(
                "score weights must not both be zero".to_string(),
            ));
        }
        if total == Decimal::ONE {
            return Ok(*self);
        }
        Ok(ScoreWeights {
            weight_index: self.weight_index / total,
            weight_momentum: self.weight_momentum / total,
        })
    }
}

/// Lifetime of cached fetches and analyses.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// How rankings are printed by the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: ReportFormat,
}

/// Where log output goes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Directory for daily-rolling log files; stdout only when unset.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "cot-pulse.log".to_string(),
        }
    }
}
