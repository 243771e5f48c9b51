// In crates/app-config/src/lib.rs

use config::{Config, Environment, File, FileFormat};

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{AppSettings, ExchangeSettings, ExecutionSettings, PipelineSettings, Settings};

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables.
pub fn load_settings() -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let settings = Config::builder()
        .add_source(File::with_name("config/base"))
        .add_source(File::with_name(&format!("config/{}", environment)).required(false))
        // e.g. `APP__EXCHANGE__API_KEY=...`
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    finish(settings.try_deserialize()?)
}

/// Parses settings from a single TOML document, without the file and
/// environment layers.
pub fn parse_settings(toml: &str) -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?;
    finish(settings.try_deserialize()?)
}

fn finish(settings: Settings) -> Result<Settings> {
    settings
        .validator
        .check()
        .map_err(|e| Error::Invalid(e.to_string()))?;
    if settings.execution.poll_interval_ms == 0 {
        return Err(Error::Invalid(
            "execution.poll_interval_ms must be positive".to_string(),
        ));
    }
    if settings.risk.aggressive_max_equity > settings.risk.standard_max_equity {
        return Err(Error::Invalid(
            "risk.aggressive_max_equity exceeds risk.standard_max_equity".to_string(),
        ));
    }
    Ok(settings)
}
