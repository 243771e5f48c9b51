// In crates/engine/src/pipeline.rs

use crate::model::{ModelClient, ModelRequest};
use crate::Result;
use app_config::{ExecutionSettings, PipelineSettings, Settings};
use core_types::{AccountState, Decision, ExecutionReport, Symbol};
use events::{EventKind, PipelineEvent, Registry, StreamSink};
use execution::{ExecutionGate, Executor, OrderRequest};
use futures::future;
use risk::{PolicyResolver, Rejection, RiskTiers, TieredValidator, ValidatorSettings};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the prompt module sent as the system prompt.
pub const SYSTEM_PROMPT_MODULE: &str = "system";

/// Everything one decision cycle needs to know about the outside world.
#[derive(Debug, Clone)]
pub struct CycleInput {
    pub trader: String,
    pub user_prompt: String,
    pub account: AccountState,
    /// Current market price per symbol, injected into decisions as `current_price`.
    pub prices: HashMap<Symbol, Decimal>,
    /// Top of book for markets that only accept limit orders.
    pub gates: HashMap<Symbol, ExecutionGate>,
}

/// A lifecycle that ended in a transport error instead of a report.
#[derive(Debug, Clone)]
pub struct LifecycleFailure {
    pub symbol: Symbol,
    pub error: String,
    /// Fills recorded before the exchange stopped answering.
    pub partial_report: Option<ExecutionReport>,
}

/// An accepted entry that never reached the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    pub symbol: Symbol,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Accepted {
        reasoning: String,
        decisions: Vec<Decision>,
        reports: Vec<ExecutionReport>,
        failures: Vec<LifecycleFailure>,
        skipped: Vec<SkippedEntry>,
    },
    /// The batch broke a rule. Returned with the batch and the reasoning for audit.
    Rejected {
        reasoning: String,
        decisions: Vec<Decision>,
        rejection: Rejection,
    },
}

/// Runs one decision cycle: model call, extraction, normalization,
/// validation and execution of the accepted entries.
pub struct DecisionPipeline {
    model: Arc<dyn ModelClient>,
    executor: Arc<dyn Executor>,
    registry: Arc<Registry>,
    resolver: PolicyResolver,
    validator: TieredValidator,
    settings: PipelineSettings,
    quantity_precision: u32,
}

impl DecisionPipeline {
    pub fn new(
        model: Arc<dyn ModelClient>,
        executor: Arc<dyn Executor>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            model,
            executor,
            registry,
            resolver: PolicyResolver::default(),
            validator: TieredValidator::default(),
            settings: PipelineSettings::default(),
            quantity_precision: ExecutionSettings::default().quantity_precision,
        }
    }

    pub fn from_settings(
        model: Arc<dyn ModelClient>,
        executor: Arc<dyn Executor>,
        registry: Arc<Registry>,
        settings: &Settings,
    ) -> Self {
        Self::new(model, executor, registry)
            .with_tiers(settings.risk.clone())
            .with_validator(settings.validator.clone())
            .with_pipeline(settings.pipeline.clone())
            .with_quantity_precision(settings.execution.quantity_precision)
    }

    pub fn with_tiers(mut self, tiers: RiskTiers) -> Self {
        self.resolver = PolicyResolver::new(tiers);
        self
    }

    pub fn with_validator(mut self, settings: ValidatorSettings) -> Self {
        self.validator = TieredValidator::new(settings);
        self
    }

    pub fn with_pipeline(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_quantity_precision(mut self, precision: u32) -> Self {
        self.quantity_precision = precision;
        self
    }

    pub async fn run_cycle(&self, input: CycleInput) -> Result<CycleOutcome> {
        let trader = input.trader.as_str();
        self.registry
            .publish(PipelineEvent::new(trader, EventKind::CycleStarted));

        let request = ModelRequest {
            trader: trader.to_string(),
            system_prompt: self
                .registry
                .prompts()
                .get_or_load(SYSTEM_PROMPT_MODULE)?,
            user_prompt: input.user_prompt.clone(),
        };
        let sink = self.registry.lookup(trader).map(|callback| {
            let (sink, _forwarder) = StreamSink::spawn(trader, callback, self.settings.stream_buffer);
            sink
        });

        let raw = self.model.complete(&request, sink.as_ref()).await?;
        let extraction = match decision::extract(&raw) {
            Ok(extraction) => extraction,
            Err(first) if self.settings.reformat_on_extraction_failure => {
                tracing::warn!(trader, error = %first, "Extraction failed, asking the model to reformat.");
                self.registry.publish(PipelineEvent::new(
                    trader,
                    EventKind::ExtractionRetried {
                        reason: first.to_string(),
                    },
                ));
                let retry = request.reformat(&raw, &first.to_string());
                let raw = self.model.complete(&retry, sink.as_ref()).await?;
                decision::extract(&raw)?
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(sink) = sink.as_ref().filter(|sink| sink.dropped() > 0) {
            tracing::debug!(trader, dropped = sink.dropped(), "Slow stream subscriber missed chunks.");
        }
        drop(sink);

        let decisions: Vec<Decision> = extraction
            .decisions
            .into_iter()
            .map(decision::normalize)
            .map(|mut decision| {
                decision.current_price = input.prices.get(&decision.symbol).copied();
                decision
            })
            .collect();
        tracing::info!(trader, count = decisions.len(), "Decisions extracted.");

        let policy = self.resolver.resolve(input.account.total_equity);
        let accepted = match self
            .validator
            .validate_batch(decisions.clone(), &input.account, &policy)
        {
            Ok(accepted) => accepted,
            Err(rejection) => {
                tracing::warn!(trader, tier = policy.tier(), %rejection, "Decision batch rejected.");
                self.registry.publish(PipelineEvent::new(
                    trader,
                    EventKind::BatchRejected {
                        reason: rejection.to_string(),
                    },
                ));
                return Ok(CycleOutcome::Rejected {
                    reasoning: extraction.reasoning,
                    decisions,
                    rejection,
                });
            }
        };
        self.registry.publish(PipelineEvent::new(
            trader,
            EventKind::DecisionsAccepted {
                count: accepted.len(),
            },
        ));

        let (reports, failures, skipped) =
            self.execute_entries(trader, &accepted, &input.gates).await;
        Ok(CycleOutcome::Accepted {
            reasoning: extraction.reasoning,
            decisions: accepted,
            reports,
            failures,
            skipped,
        })
    }

    /// Runs one lifecycle per accepted entry concurrently and waits for all of them.
    async fn execute_entries(
        &self,
        trader: &str,
        accepted: &[Decision],
        gates: &HashMap<Symbol, ExecutionGate>,
    ) -> (Vec<ExecutionReport>, Vec<LifecycleFailure>, Vec<SkippedEntry>) {
        let mut skipped = Vec::new();
        let mut handles = Vec::new();
        for decision in accepted.iter().filter(|d| d.action.is_open()) {
            match order_request(decision, gates.get(&decision.symbol), self.quantity_precision) {
                Ok(request) => {
                    let executor = self.executor.clone();
                    let symbol = request.symbol.clone();
                    let handle = tokio::spawn(async move { executor.execute(&request).await });
                    handles.push((symbol, handle));
                }
                Err(skip) => {
                    tracing::warn!(trader, symbol = %skip.symbol, reason = %skip.reason, "Accepted entry not executed.");
                    skipped.push(skip);
                }
            }
        }

        let (symbols, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = future::join_all(handles).await;

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for (symbol, result) in symbols.into_iter().zip(results) {
            let (error, partial_report) = match result {
                Ok(Ok(report)) => {
                    self.registry.publish(PipelineEvent::new(
                        trader,
                        EventKind::ExecutionFinished(report.clone()),
                    ));
                    reports.push(report);
                    continue;
                }
                Ok(Err(e)) => (e.to_string(), e.partial_report().cloned()),
                Err(join_error) => (join_error.to_string(), None),
            };
            tracing::error!(trader, %symbol, %error, "Order lifecycle failed.");
            failures.push(LifecycleFailure {
                symbol,
                error,
                partial_report,
            });
        }
        (reports, failures, skipped)
    }
}

/// Builds the order for an accepted entry.
///
/// Entries that rest at `limit_price` never become market orders, and
/// entries the executor cannot price or size are skipped with the reason.
pub fn order_request(
    decision: &Decision,
    gate: Option<&ExecutionGate>,
    quantity_precision: u32,
) -> std::result::Result<OrderRequest, SkippedEntry> {
    let skip = |reason: String| SkippedEntry {
        symbol: decision.symbol.clone(),
        reason,
    };
    let side = decision
        .action
        .open_side()
        .ok_or_else(|| skip(format!("{} is not an entry", decision.action)))?;

    let limit_price = if decision.rests_at_limit() {
        match decision.limit_price.filter(|p| *p > Decimal::ZERO) {
            Some(price) => Some(price),
            None => return Err(skip("resting entry without a limit price".to_string())),
        }
    } else {
        None
    };
    let reference_price = decision
        .current_price
        .or(limit_price)
        .ok_or_else(|| skip("no market price to execute against".to_string()))?;

    let sizing_price = limit_price.unwrap_or(reference_price);
    let notional = decision
        .notional()
        .ok_or_else(|| skip("margin or leverage missing".to_string()))?;
    let quantity = (notional / sizing_price)
        .round_dp_with_strategy(quantity_precision, RoundingStrategy::ToZero);
    if quantity <= Decimal::ZERO {
        return Err(skip(format!(
            "notional {notional} at {sizing_price} rounds to a zero quantity"
        )));
    }

    Ok(OrderRequest {
        symbol: decision.symbol.clone(),
        side,
        quantity,
        limit_price,
        reference_price,
        leverage: decision.leverage.unwrap_or(1),
        gate: gate.copied(),
    })
}
