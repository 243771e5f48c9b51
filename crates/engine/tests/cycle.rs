// In crates/engine/tests/cycle.rs

use app_config::ExecutionSettings;
use async_trait::async_trait;
use core_types::{AccountState, ExecutionStatus, Symbol};
use engine::{
    CycleInput, CycleOutcome, DecisionPipeline, Error, ModelClient, ModelRequest,
    SYSTEM_PROMPT_MODULE,
};
use events::{EventKind, Registry, StreamCallback, StreamSink};
use execution::{LimitOrderExecutor, SimulatedExchange, SimulationSettings};
use risk::Violation;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Replays canned responses in order and records every request.
struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &'static str {
        "ScriptedModel"
    }

    async fn complete(
        &self,
        request: &ModelRequest,
        stream: Option<&StreamSink>,
    ) -> engine::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::RiskCallFailed("script exhausted".to_string()))?;
        if let Some(stream) = stream {
            for line in response.lines() {
                stream.push(line);
            }
        }
        Ok(response)
    }
}

const BTC_LONG: &str = r#"BTC reclaimed the range high with rising volume. Grade: A (80).
```json
[
  {"symbol": "btcusdt", "action": "open_long", "leverage": 20, "position_margin_usd": 30,
   "stop_loss": 97000, "take_profit": 110000, "tp1": 103000, "tp2": 106000, "tp3": 110000,
   "confidence": 78, "reasoning": "Range reclaim. grade: A score: 80"}
]
```"#;

fn registry() -> Arc<Registry> {
    let registry = Registry::new("prompts");
    registry
        .prompts()
        .get_or_load_with(SYSTEM_PROMPT_MODULE, || {
            Ok("You manage a small futures account.".to_string())
        })
        .unwrap();
    Arc::new(registry)
}

fn pipeline(model: Arc<ScriptedModel>, registry: Arc<Registry>) -> DecisionPipeline {
    let exchange = Arc::new(SimulatedExchange::new(SimulationSettings {
        fill_delay_ms: Some(20),
        ..Default::default()
    }));
    let executor = Arc::new(LimitOrderExecutor::new(
        exchange,
        ExecutionSettings {
            wait_seconds: 2,
            poll_interval_ms: 100,
            ..Default::default()
        },
    ));
    DecisionPipeline::new(model, executor, registry)
}

fn input() -> CycleInput {
    CycleInput {
        trader: "alpha".to_string(),
        user_prompt: "Account equity 500 USDT. BTCUSDT 100000.".to_string(),
        account: AccountState::new(dec!(500)),
        prices: HashMap::from([(Symbol::new("BTCUSDT"), dec!(100000))]),
        gates: HashMap::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_accepted_entry_is_executed() {
    let model = ScriptedModel::new(&[BTC_LONG]);
    let registry = registry();
    let mut events = registry.subscribe();

    let outcome = pipeline(model.clone(), registry).run_cycle(input()).await.unwrap();

    let CycleOutcome::Accepted {
        reasoning,
        decisions,
        reports,
        failures,
        skipped,
    } = outcome
    else {
        panic!("expected the batch to be accepted");
    };
    assert!(reasoning.contains("range high"));
    assert_eq!(decisions[0].symbol, Symbol::new("BTCUSDT"));
    assert_eq!(decisions[0].risk_usd, Some(dec!(18)));
    assert!(failures.is_empty());
    assert!(skipped.is_empty());

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, Some(ExecutionStatus::Filled));
    assert_eq!(reports[0].filled_quantity, dec!(0.006));
    // Marketable limit 0.1% through the injected price.
    assert_eq!(reports[0].avg_fill_price, dec!(100100));
    assert_eq!(model.calls(), 1);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    assert!(matches!(kinds.first(), Some(EventKind::CycleStarted)));
    assert!(matches!(kinds.last(), Some(EventKind::ExecutionFinished(_))));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_batch_is_returned_with_context() {
    // Grade C forbids opening.
    let response = BTC_LONG.replace("grade: A score: 80", "grade: C score: 50");
    let model = ScriptedModel::new(&[&response]);

    let outcome = pipeline(model, registry()).run_cycle(input()).await.unwrap();

    let CycleOutcome::Rejected {
        decisions,
        rejection,
        ..
    } = outcome
    else {
        panic!("expected a rejection");
    };
    assert_eq!(decisions.len(), 1);
    assert_eq!(rejection.ordinal, 1);
    assert!(matches!(rejection.violation, Violation::GradeForbidsOpen { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_grade_b_limit_preference_needs_a_limit_price() {
    let response = BTC_LONG
        .replace("grade: A score: 80", "grade: B score: 70")
        .replace(r#""confidence": 78,"#, r#""confidence": 78, "execution_preference": "limit","#);
    let model = ScriptedModel::new(&[&response]);

    let outcome = pipeline(model, registry()).run_cycle(input()).await.unwrap();

    let CycleOutcome::Rejected { rejection, .. } = outcome else {
        panic!("a grade B entry without a limit price must not execute");
    };
    assert_eq!(rejection.violation, Violation::MissingField("limit_price"));
}

#[tokio::test(start_paused = true)]
async fn test_unpriced_market_entry_is_reported_as_skipped() {
    let model = ScriptedModel::new(&[BTC_LONG]);
    let unpriced = CycleInput {
        prices: HashMap::new(),
        ..input()
    };

    let outcome = pipeline(model, registry()).run_cycle(unpriced).await.unwrap();

    let CycleOutcome::Accepted {
        decisions,
        reports,
        skipped,
        ..
    } = outcome
    else {
        panic!("expected the batch to be accepted");
    };
    assert_eq!(decisions.len(), 1);
    assert!(reports.is_empty());
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].symbol, Symbol::new("BTCUSDT"));
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_response_gets_one_reformat_retry() {
    let model = ScriptedModel::new(&["I would buy BTC here, [x] confirmed.", BTC_LONG]);

    let outcome = pipeline(model.clone(), registry()).run_cycle(input()).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Accepted { .. }));
    assert_eq!(model.calls(), 2);
    let retry = &model.requests.lock().unwrap()[1];
    assert!(retry.user_prompt.contains("could not be parsed"));
}

#[tokio::test(start_paused = true)]
async fn test_second_extraction_failure_is_fatal() {
    let model = ScriptedModel::new(&["no payload", "still no payload"]);

    let result = pipeline(model.clone(), registry()).run_cycle(input()).await;

    assert!(matches!(result, Err(Error::ExtractionFailed(_))));
    assert_eq!(model.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_model_failure_is_fatal() {
    let model = ScriptedModel::new(&[]);
    let result = pipeline(model, registry()).run_cycle(input()).await;
    assert!(matches!(result, Err(Error::RiskCallFailed(_))));
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_executes_nothing() {
    let model = ScriptedModel::new(&["Nothing compelling this cycle.\n[]"]);

    let outcome = pipeline(model, registry()).run_cycle(input()).await.unwrap();

    match outcome {
        CycleOutcome::Accepted {
            decisions, reports, ..
        } => {
            assert!(decisions.is_empty());
            assert!(reports.is_empty());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_model_output_is_streamed_to_registered_trader() {
    let chunks = Arc::new(Mutex::new(Vec::new()));
    let sink_chunks = chunks.clone();
    let callback: StreamCallback = Arc::new(move |chunk: &str| {
        sink_chunks.lock().unwrap().push(chunk.to_string());
        Ok(())
    });
    let registry = registry();
    registry.register("alpha", callback);
    let model = ScriptedModel::new(&[BTC_LONG]);

    pipeline(model, registry).run_cycle(input()).await.unwrap();
    // Let the forwarder drain.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let chunks = chunks.lock().unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks[0].starts_with("BTC reclaimed"));
}
