// In crates/execution/src/executor.rs

use crate::types::{LimitOrder, OrderId, OrderRequest, OrderSnapshot, OrderState};
use crate::{Error, ExchangeClient, Executor, Result};
use app_config::types::ExecutionSettings;
use async_trait::async_trait;
use core_types::{ExecutionAttempt, ExecutionReport, ExecutionStatus, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// How one attempt's wait window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Filled,
    /// Something filled and `cancel_on_partial_fill` is set.
    PartiallyFilled,
    /// The exchange cancelled the order while we were waiting.
    CancelledByVenue,
    WindowElapsed,
}

/// Drives a limit order through submit, poll, cancel and resubmit until it
/// reaches a terminal status.
///
/// Attempts are a bounded loop of `1 + max_retries` iterations. Each one
/// submits whatever quantity is still unfilled, so fills from earlier
/// attempts are never requested twice.
pub struct LimitOrderExecutor {
    exchange: Arc<dyn ExchangeClient>,
    settings: ExecutionSettings,
}

impl LimitOrderExecutor {
    pub fn new(exchange: Arc<dyn ExchangeClient>, settings: ExecutionSettings) -> Self {
        Self { exchange, settings }
    }

    pub fn total_attempts(&self) -> u32 {
        1 + self.settings.max_retries
    }

    /// Price for a given attempt (1-based).
    ///
    /// Limit-only markets rest on our side of the book; limit entries use
    /// their own price; market entries become marketable limits. Retries
    /// step toward the market by `reprice_step_bps` per attempt.
    fn attempt_price(&self, request: &OrderRequest, attempt_index: u32) -> Decimal {
        let base = match (&request.gate, request.limit_price) {
            (Some(gate), _) => match request.side {
                Side::Long => gate.best_bid,
                Side::Short => gate.best_ask,
            },
            (None, Some(limit)) => limit,
            (None, None) => {
                request.reference_price
                    * (Decimal::ONE + request.side.sign() * self.settings.market_slippage_pct)
            }
        };
        let steps = Decimal::from(attempt_index.saturating_sub(1));
        let shift = self.settings.reprice_step_bps * steps / dec!(10000);
        (base * (Decimal::ONE + request.side.sign() * shift))
            .round_dp(8)
            .normalize()
    }

    /// Polls until the order fills, the venue cancels it, a partial fill
    /// should stop the lifecycle, or the wait window closes.
    async fn wait_for_fill(
        &self,
        order_id: &OrderId,
        quantity: Decimal,
    ) -> Result<(WaitOutcome, OrderSnapshot)> {
        let poll_every = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        let deadline = Instant::now() + Duration::from_secs(self.settings.wait_seconds);

        loop {
            tokio::time::sleep_until((Instant::now() + poll_every).min(deadline)).await;
            let snapshot = self.exchange.poll_status(order_id).await?;

            match snapshot.state {
                OrderState::Filled => return Ok((WaitOutcome::Filled, snapshot)),
                OrderState::Cancelled => return Ok((WaitOutcome::CancelledByVenue, snapshot)),
                OrderState::Open if snapshot.filled_quantity >= quantity => {
                    return Ok((WaitOutcome::Filled, snapshot));
                }
                OrderState::Open
                    if snapshot.filled_quantity > Decimal::ZERO
                        && self.settings.cancel_on_partial_fill =>
                {
                    return Ok((WaitOutcome::PartiallyFilled, snapshot));
                }
                OrderState::Open => {}
            }

            if Instant::now() >= deadline {
                return Ok((WaitOutcome::WindowElapsed, snapshot));
            }
        }
    }

    /// Cancels the order and re-reads it, picking up fills that landed
    /// between the last poll and the cancel.
    async fn cancel_and_settle(&self, order_id: &OrderId) -> Result<OrderSnapshot> {
        let cancelled = self.exchange.cancel(order_id).await;
        let settled = self.exchange.poll_status(order_id).await?;
        if let Err(e) = cancelled {
            if settled.state == OrderState::Open {
                return Err(e);
            }
            tracing::debug!(%order_id, error = %e, state = ?settled.state, "Cancel raced a final order state.");
        }
        Ok(settled)
    }

    fn finish(
        &self,
        report: ExecutionReport,
        status: ExecutionStatus,
        started: Instant,
    ) -> ExecutionReport {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = report.finish(status, duration_ms);
        tracing::info!(
            symbol = %report.symbol,
            side = %report.side,
            %status,
            attempts = report.attempt_index,
            requested = %report.requested_quantity,
            filled = %report.filled_quantity,
            avg_price = %report.avg_fill_price,
            duration_ms,
            "Order lifecycle finished."
        );
        report
    }
}

#[async_trait]
impl Executor for LimitOrderExecutor {
    fn name(&self) -> &'static str {
        "LimitOrderExecutor"
    }

    async fn execute(&self, request: &OrderRequest) -> Result<ExecutionReport> {
        if request.quantity <= Decimal::ZERO {
            return Err(Error::InvalidRequest {
                reason: format!("quantity must be positive, got {}", request.quantity),
            });
        }

        let started = Instant::now();
        let mut report =
            ExecutionReport::new(request.symbol.clone(), request.side, request.quantity);
        let mut in_flight = None;

        match self.run_attempts(request, &mut report, &mut in_flight).await {
            Ok(status) => Ok(self.finish(report, status, started)),
            Err(source) if report.attempts.is_empty() && in_flight.is_none() => Err(source),
            Err(source) => Err(self.abandon(report, in_flight, source).await),
        }
    }
}

/// The order of the current attempt, from submission until it settles.
#[derive(Debug, Clone)]
struct InFlight {
    order_id: OrderId,
    attempt_index: u32,
    price: Decimal,
    quantity: Decimal,
    started: Instant,
}

impl InFlight {
    fn record_into(&self, report: &mut ExecutionReport, settled: &OrderSnapshot) -> Decimal {
        let filled = settled.filled_quantity.min(self.quantity);
        report.record(ExecutionAttempt {
            attempt_index: self.attempt_index,
            submitted_price: self.price,
            submitted_quantity: self.quantity,
            filled_quantity_delta: filled,
            fill_price: settled.avg_price,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        filled
    }
}

impl LimitOrderExecutor {
    /// The attempt loop. `in_flight` holds the submitted order that has not
    /// settled yet, so an error can leave it for [`Self::abandon`].
    async fn run_attempts(
        &self,
        request: &OrderRequest,
        report: &mut ExecutionReport,
        in_flight: &mut Option<InFlight>,
    ) -> Result<ExecutionStatus> {
        let post_only = request.gate.is_some() && self.settings.post_only_when_limit_only;
        self.exchange
            .prepare(&request.symbol, request.leverage)
            .await?;

        for attempt_index in 1..=self.total_attempts() {
            let remaining = report.remaining_quantity();
            let order = LimitOrder {
                symbol: request.symbol.clone(),
                side: request.side,
                price: self.attempt_price(request, attempt_index),
                quantity: remaining,
                post_only,
            };
            if order.price <= Decimal::ZERO {
                return Err(Error::InvalidRequest {
                    reason: format!("no usable price for {} (got {})", order.symbol, order.price),
                });
            }

            let started = Instant::now();
            let order_id = self.exchange.submit(&order).await?;
            tracing::debug!(%order_id, attempt_index, price = %order.price, quantity = %remaining, post_only, "Order submitted.");
            let attempt = InFlight {
                order_id,
                attempt_index,
                price: order.price,
                quantity: remaining,
                started,
            };
            *in_flight = Some(attempt.clone());

            let (outcome, snapshot) = self.wait_for_fill(&attempt.order_id, remaining).await?;
            let settled = match outcome {
                WaitOutcome::Filled | WaitOutcome::CancelledByVenue => snapshot,
                WaitOutcome::PartiallyFilled | WaitOutcome::WindowElapsed => {
                    self.cancel_and_settle(&attempt.order_id).await?
                }
            };
            *in_flight = None;
            let filled = attempt.record_into(report, &settled);

            let status = if settled.state == OrderState::Filled
                || report.remaining_quantity().is_zero()
            {
                Some(ExecutionStatus::Filled)
            } else {
                match outcome {
                    WaitOutcome::CancelledByVenue => Some(ExecutionStatus::Cancelled),
                    WaitOutcome::PartiallyFilled => Some(ExecutionStatus::PartiallyFilled),
                    WaitOutcome::WindowElapsed
                        if filled > Decimal::ZERO && self.settings.cancel_on_partial_fill =>
                    {
                        Some(ExecutionStatus::PartiallyFilled)
                    }
                    _ => None,
                }
            };
            if let Some(status) = status {
                return Ok(status);
            }

            tracing::info!(
                order_id = %attempt.order_id,
                attempt_index,
                filled = %filled,
                remaining = %report.remaining_quantity(),
                attempts_left = self.total_attempts() - attempt_index,
                "Wait window elapsed without a full fill."
            );
        }

        if self.settings.max_retries == 0 {
            Ok(ExecutionStatus::Timeout)
        } else {
            Ok(ExecutionStatus::RetriesExhausted)
        }
    }

    /// Best-effort cleanup after the exchange failed mid-lifecycle: cancel
    /// the order still resting, fold in whatever it filled, and hand the
    /// report back with the error.
    async fn abandon(
        &self,
        mut report: ExecutionReport,
        in_flight: Option<InFlight>,
        source: Error,
    ) -> Error {
        if let Some(attempt) = in_flight {
            if let Err(e) = self.exchange.cancel(&attempt.order_id).await {
                tracing::warn!(order_id = %attempt.order_id, error = %e, "Could not cancel the interrupted order.");
            }
            match self.exchange.poll_status(&attempt.order_id).await {
                Ok(settled) => {
                    attempt.record_into(&mut report, &settled);
                }
                Err(e) => {
                    tracing::warn!(order_id = %attempt.order_id, error = %e, "Fills of the interrupted order are unknown.");
                }
            }
        }

        tracing::error!(
            symbol = %report.symbol,
            attempts = report.attempt_index,
            filled = %report.filled_quantity,
            error = %source,
            "Order lifecycle interrupted."
        );
        Error::Transport {
            report: Box::new(report),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedExchange;
    use crate::types::{ExecutionGate, SimulationSettings};
    use core_types::Symbol;

    fn executor(settings: ExecutionSettings) -> LimitOrderExecutor {
        let exchange = Arc::new(SimulatedExchange::new(SimulationSettings::never_fill()));
        LimitOrderExecutor::new(exchange, settings)
    }

    fn request(side: Side) -> OrderRequest {
        OrderRequest {
            symbol: Symbol::new("ETHUSDT"),
            side,
            quantity: dec!(0.5),
            limit_price: None,
            reference_price: dec!(3000),
            leverage: 10,
            gate: None,
        }
    }

    #[test]
    fn test_market_entries_become_marketable_limits() {
        let executor = executor(ExecutionSettings {
            market_slippage_pct: dec!(0.001),
            ..Default::default()
        });
        assert_eq!(executor.attempt_price(&request(Side::Long), 1), dec!(3003));
        assert_eq!(executor.attempt_price(&request(Side::Short), 1), dec!(2997));
    }

    #[test]
    fn test_gate_overrides_limit_price() {
        let executor = executor(ExecutionSettings::default());
        let gated = OrderRequest {
            limit_price: Some(dec!(2950)),
            gate: Some(ExecutionGate {
                best_bid: dec!(2999.5),
                best_ask: dec!(3000.5),
            }),
            ..request(Side::Long)
        };
        assert_eq!(executor.attempt_price(&gated, 1), dec!(2999.5));

        let short = OrderRequest {
            side: Side::Short,
            ..gated
        };
        assert_eq!(executor.attempt_price(&short, 1), dec!(3000.5));
    }

    #[test]
    fn test_retries_step_toward_the_market() {
        let executor = executor(ExecutionSettings {
            reprice_step_bps: dec!(10),
            ..Default::default()
        });
        let limit = OrderRequest {
            limit_price: Some(dec!(3000)),
            ..request(Side::Long)
        };
        assert_eq!(executor.attempt_price(&limit, 1), dec!(3000));
        assert_eq!(executor.attempt_price(&limit, 2), dec!(3003));
        assert_eq!(executor.attempt_price(&limit, 3), dec!(3006));

        let short = OrderRequest {
            side: Side::Short,
            ..limit
        };
        assert_eq!(executor.attempt_price(&short, 2), dec!(2997));
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected() {
        let executor = executor(ExecutionSettings::default());
        let empty = OrderRequest {
            quantity: dec!(0),
            ..request(Side::Long)
        };
        assert!(matches!(
            executor.execute(&empty).await,
            Err(Error::InvalidRequest { .. })
        ));
    }
}
