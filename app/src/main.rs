// In app/src/main.rs

use anyhow::{Context, Result};
use api_client::ApiClient;
use app_config::Settings;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use core_types::{AccountState, Decision, Side, Symbol};
use engine::{CycleInput, CycleOutcome, DecisionPipeline, ModelClient, ModelRequest};
use events::{Registry, StreamSink};
use execution::{LimitOrderExecutor, SimulatedExchange, SimulationSettings};
use risk::{PolicyResolver, RiskTiers, TieredValidator, ValidatorSettings};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

mod tracing_layer;
use self::tracing_layer::{AuditLayer, AuditLog};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a disciplined crypto futures trader. \
Reason about the market first, then list your decisions as a JSON array.";

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(
    name = "autotrader",
    author,
    version,
    about,
    long_about = "Extracts, validates and executes model trade decisions."
)]
struct Cli {
    /// Log level for the console output.
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extracts, normalizes and validates a recorded model response, printing JSON.
    Validate {
        #[command(flatten)]
        cycle: CycleArgs,

        /// Read equity, open positions and mark prices from the exchange.
        #[arg(long)]
        from_exchange: bool,
    },

    /// Runs a full decision cycle against the simulated exchange.
    Simulate {
        #[command(flatten)]
        cycle: CycleArgs,

        /// Milliseconds after submission until an order fills.
        #[arg(long, default_value_t = 10)]
        fill_delay_ms: u64,

        /// Orders never fill.
        #[arg(long, conflicts_with = "fill_delay_ms")]
        never_fill: bool,

        /// Fraction of each order that fills (0 to 1).
        #[arg(long)]
        partial_ratio: Option<Decimal>,

        /// Fixed fill price instead of the order price.
        #[arg(long)]
        fill_price: Option<Decimal>,

        /// The venue cancels still-open orders after this many milliseconds.
        #[arg(long)]
        cancel_after_ms: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct CycleArgs {
    /// File holding the raw model response.
    #[arg(short, long)]
    input: PathBuf,

    /// Account equity in USDT.
    #[arg(long, default_value = "500")]
    equity: Decimal,

    /// Market price per symbol, e.g. `BTCUSDT=100000`.
    #[arg(long = "price", value_parser = parse_price)]
    prices: Vec<(Symbol, Decimal)>,

    /// Open position, e.g. `ETHUSDT:long`.
    #[arg(long = "position", value_parser = parse_position)]
    positions: Vec<(Symbol, Side)>,

    #[arg(long, default_value = "cli")]
    trader: String,
}

impl CycleArgs {
    fn account(&self) -> AccountState {
        self.positions
            .iter()
            .fold(AccountState::new(self.equity), |account, (symbol, side)| {
                account.with_position(symbol.clone(), *side)
            })
    }

    fn price_map(&self) -> HashMap<Symbol, Decimal> {
        self.prices.iter().cloned().collect()
    }
}

fn parse_price(raw: &str) -> std::result::Result<(Symbol, Decimal), String> {
    let (symbol, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=PRICE, got '{raw}'"))?;
    let price: Decimal = price
        .trim()
        .parse()
        .map_err(|e| format!("invalid price '{price}': {e}"))?;
    if price <= Decimal::ZERO {
        return Err(format!("price must be positive, got {price}"));
    }
    Ok((Symbol::new(symbol), price))
}

fn parse_position(raw: &str) -> std::result::Result<(Symbol, Side), String> {
    let (symbol, side) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected SYMBOL:long|short, got '{raw}'"))?;
    let side = match side.trim().to_lowercase().as_str() {
        "long" => Side::Long,
        "short" => Side::Short,
        other => return Err(format!("unknown side '{other}'")),
    };
    Ok((Symbol::new(symbol), side))
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let (audit_layer, audit_log) = AuditLayer::new();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            tracing_subscriber::filter::Targets::new()
                .with_target("reqwest", tracing::Level::WARN)
                .with_target("hyper", tracing::Level::WARN)
                .with_default(cli.log_level),
        );
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(audit_layer)
        .init();

    let output = match cli.command {
        Commands::Validate {
            cycle,
            from_exchange,
        } => handle_validate(cycle, from_exchange).await?,
        Commands::Simulate {
            cycle,
            fill_delay_ms,
            never_fill,
            partial_ratio,
            fill_price,
            cancel_after_ms,
        } => {
            let simulation = SimulationSettings {
                fill_delay_ms: (!never_fill).then_some(fill_delay_ms),
                partial_fill_ratio: partial_ratio,
                fill_price,
                cancel_after_ms,
            };
            handle_simulate(cycle, simulation).await?
        }
    };

    let output = with_audit(output, &audit_log);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Loads layered settings, falling back to built-in defaults for the risk
/// sections when no configuration is present.
fn load_settings_or_defaults() -> Option<Settings> {
    match app_config::load_settings() {
        Ok(settings) => {
            tracing::info!(environment = %settings.app.environment, "Application settings loaded successfully.");
            Some(settings)
        }
        Err(e) => {
            tracing::warn!(error = %e, "No usable configuration, using built-in defaults.");
            None
        }
    }
}

// --- "Validate" Subcommand Logic ---

async fn handle_validate(args: CycleArgs, from_exchange: bool) -> Result<serde_json::Value> {
    let settings = load_settings_or_defaults();
    let (tiers, validator_settings) = match &settings {
        Some(s) => (s.risk.clone(), s.validator.clone()),
        None => (RiskTiers::default(), ValidatorSettings::default()),
    };

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let extraction = decision::extract(&raw)?;
    let mut decisions: Vec<Decision> = extraction
        .decisions
        .into_iter()
        .map(decision::normalize)
        .collect();

    let (account, mut prices) = if from_exchange {
        let settings = settings.context("--from-exchange needs the [exchange] configuration")?;
        let client = ApiClient::new(&settings.exchange)?;
        let account = client.get_account().await?.to_account_state();
        let mut prices = HashMap::new();
        for decision in &decisions {
            if !decision.symbol.as_str().is_empty() && !prices.contains_key(&decision.symbol) {
                let mark = client.get_mark_price(&decision.symbol).await?;
                prices.insert(decision.symbol.clone(), mark);
            }
        }
        (account, prices)
    } else {
        (args.account(), HashMap::new())
    };
    prices.extend(args.price_map());

    for decision in &mut decisions {
        decision.current_price = prices.get(&decision.symbol).copied();
    }

    let policy = PolicyResolver::new(tiers).resolve(account.total_equity);
    let validator = TieredValidator::new(validator_settings);
    let result = match validator.validate_batch(decisions, &account, &policy) {
        Ok(accepted) => json!({ "accepted": accepted }),
        Err(rejection) => json!({
            "rejected": {
                "ordinal": rejection.ordinal,
                "symbol": rejection.symbol,
                "action": rejection.action,
                "reason": rejection.violation.to_string(),
            }
        }),
    };

    Ok(json!({
        "reasoning": extraction.reasoning,
        "equity": account.total_equity,
        "policy": policy,
        "result": result,
    }))
}

// --- "Simulate" Subcommand Logic ---

/// Replays a recorded response instead of calling a model.
struct RecordedModel {
    response: String,
}

#[async_trait]
impl ModelClient for RecordedModel {
    fn name(&self) -> &'static str {
        "RecordedModel"
    }

    async fn complete(
        &self,
        _request: &ModelRequest,
        stream: Option<&StreamSink>,
    ) -> engine::Result<String> {
        if let Some(stream) = stream {
            stream.push(self.response.as_str());
        }
        Ok(self.response.clone())
    }
}

async fn handle_simulate(
    args: CycleArgs,
    simulation: SimulationSettings,
) -> Result<serde_json::Value> {
    let settings = load_settings_or_defaults();
    let execution_settings = settings
        .as_ref()
        .map(|s| s.execution.clone())
        .unwrap_or_default();
    let prompt_dir = settings
        .as_ref()
        .map(|s| s.pipeline.prompt_dir.clone())
        .unwrap_or_else(|| app_config::PipelineSettings::default().prompt_dir);

    let response = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let registry = Arc::new(Registry::new(prompt_dir));
    if let Err(e) = registry.prompts().get_or_load(engine::SYSTEM_PROMPT_MODULE) {
        tracing::warn!(error = %e, "System prompt module missing, using the built-in prompt.");
        registry
            .prompts()
            .get_or_load_with(engine::SYSTEM_PROMPT_MODULE, || {
                Ok(DEFAULT_SYSTEM_PROMPT.to_string())
            })?;
    }

    let exchange = Arc::new(SimulatedExchange::new(simulation));
    let executor = Arc::new(LimitOrderExecutor::new(exchange.clone(), execution_settings));
    let model = Arc::new(RecordedModel { response });
    let pipeline = match &settings {
        Some(settings) => {
            DecisionPipeline::from_settings(model, executor, registry.clone(), settings)
        }
        None => DecisionPipeline::new(model, executor, registry.clone()),
    };

    let outcome = pipeline
        .run_cycle(CycleInput {
            trader: args.trader.clone(),
            user_prompt: String::new(),
            account: args.account(),
            prices: args.price_map(),
            gates: HashMap::new(),
        })
        .await;
    registry.shutdown();

    let output = match outcome? {
        CycleOutcome::Accepted {
            reasoning,
            decisions,
            reports,
            failures,
            skipped,
        } => json!({
            "reasoning": reasoning,
            "accepted": decisions,
            "reports": reports,
            "failures": failures
                .iter()
                .map(|f| {
                    json!({
                        "symbol": f.symbol,
                        "error": f.error,
                        "partial_report": f.partial_report,
                    })
                })
                .collect::<Vec<_>>(),
            "skipped": skipped
                .iter()
                .map(|s| json!({ "symbol": s.symbol, "reason": s.reason }))
                .collect::<Vec<_>>(),
            "orders_submitted": exchange.submitted().len(),
        }),
        CycleOutcome::Rejected {
            reasoning,
            decisions,
            rejection,
        } => json!({
            "reasoning": reasoning,
            "decisions": decisions,
            "rejected": {
                "ordinal": rejection.ordinal,
                "symbol": rejection.symbol,
                "action": rejection.action,
                "reason": rejection.violation.to_string(),
            },
        }),
    };
    Ok(output)
}

fn with_audit(mut output: serde_json::Value, audit_log: &AuditLog) -> serde_json::Value {
    let entries: Vec<_> = audit_log
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .iter()
        .cloned()
        .collect();
    if let Some(object) = output.as_object_mut() {
        object.insert("audit".to_string(), json!(entries));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price() {
        assert_eq!(
            parse_price("btcusdt=100000.5").unwrap(),
            (Symbol::new("BTCUSDT"), dec!(100000.5))
        );
        assert!(parse_price("BTCUSDT").is_err());
        assert!(parse_price("BTCUSDT=-1").is_err());
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(
            parse_position("ETHUSDT:Short").unwrap(),
            (Symbol::new("ETHUSDT"), Side::Short)
        );
        assert!(parse_position("ETHUSDT:flat").is_err());
    }

    #[test]
    fn test_cli_parses_simulate_flags() {
        let cli = Cli::try_parse_from([
            "autotrader",
            "simulate",
            "--input",
            "response.txt",
            "--equity",
            "800",
            "--price",
            "BTCUSDT=100000",
            "--position",
            "ETHUSDT:long",
            "--partial-ratio",
            "0.4",
        ])
        .unwrap();

        let Commands::Simulate {
            cycle,
            partial_ratio,
            never_fill,
            ..
        } = cli.command
        else {
            panic!("expected simulate");
        };
        assert_eq!(partial_ratio, Some(dec!(0.4)));
        assert!(!never_fill);

        let account = cycle.account();
        assert_eq!(account.total_equity, dec!(800));
        assert!(account.holds(&Symbol::new("ETHUSDT"), Side::Long));
        assert_eq!(cycle.price_map()[&Symbol::new("BTCUSDT")], dec!(100000));
    }
}
