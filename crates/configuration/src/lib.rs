use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{
    AnalyticsSettings, CacheSettings, Config, EngineSettings, LoggingSettings, MomentumScale,
    OutputSettings, ReportFormat, ScoreWeights, ScoringSettings, UpstreamSettings,
};
pub use error::ConfigError;
pub use telemetry::init_tracing;

/// Loads the application configuration from the `config.toml` file.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new("config.toml"))
}

/// Loads and validates the configuration from `path`.
///
/// The file is optional; any value can be overridden from the environment
/// with the `COT` prefix and `__` as the section separator, for example
/// `COT__CACHE__TTL=30s`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("COT")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
