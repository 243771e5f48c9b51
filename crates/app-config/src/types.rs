// In crates/app-config/src/types.rs

use risk::{RiskTiers, ValidatorSettings};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Credentials and endpoints of the futures exchange.
    pub exchange: ExchangeSettings,
    /// Equity thresholds and bounds of the three risk tiers.
    #[serde(default)]
    pub risk: RiskTiers,
    /// Account-wide limits the validator applies to every decision.
    #[serde(default)]
    pub validator: ValidatorSettings,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExchangeSettings {
    pub api_key: String,
    pub secret_key: String,
    /// The REST API base URL of the futures venue.
    pub rest_base_url: String,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_recv_window_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Parameters of the limit-order lifecycle.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutionSettings {
    /// How long one attempt waits for a fill before cancelling.
    pub wait_seconds: u64,
    /// Resubmissions after the first attempt.
    pub max_retries: u32,
    pub poll_interval_ms: u64,
    /// Stop at the first partial fill instead of chasing the remainder.
    pub cancel_on_partial_fill: bool,
    /// Post-only orders on limit-only markets.
    pub post_only_when_limit_only: bool,
    /// Price step toward the market per retry, in basis points.
    pub reprice_step_bps: Decimal,
    /// Offset of the marketable limit used for market executions.
    pub market_slippage_pct: Decimal,
    /// Decimal places of order quantities.
    pub quantity_precision: u32,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            wait_seconds: 30,
            max_retries: 2,
            poll_interval_ms: 500,
            cancel_on_partial_fill: true,
            post_only_when_limit_only: true,
            reprice_step_bps: Decimal::ZERO,
            market_slippage_pct: dec!(0.001),
            quantity_precision: 3,
        }
    }
}

/// Settings of the decision cycle around the model call.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Ask the model once more, for a reformatted answer, when extraction fails.
    pub reformat_on_extraction_failure: bool,
    /// Capacity of the bounded channel that carries streamed model output.
    pub stream_buffer: usize,
    /// Directory holding the prompt modules.
    pub prompt_dir: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            reformat_on_extraction_failure: true,
            stream_buffer: 64,
            prompt_dir: "prompts".to_string(),
        }
    }
}
