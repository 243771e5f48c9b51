// In crates/execution/src/simulated.rs

use crate::types::{LimitOrder, OrderId, OrderSnapshot, OrderState, SimulationSettings};
use crate::{Error, ExchangeClient, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug)]
struct SimOrder {
    order: LimitOrder,
    submitted_at: Instant,
    /// Set once cancelled, by us or by the simulated venue.
    frozen: Option<OrderSnapshot>,
}

#[derive(Debug, Default)]
struct Book {
    next_id: u64,
    orders: HashMap<u64, SimOrder>,
    submitted: Vec<LimitOrder>,
    cancels: usize,
}

/// A deterministic exchange double.
///
/// Fills are a pure function of the time elapsed since submission, measured
/// on the tokio clock, so tests can pause time and advance it exactly.
#[derive(Debug)]
pub struct SimulatedExchange {
    settings: SimulationSettings,
    book: Mutex<Book>,
}

impl SimulatedExchange {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            settings,
            book: Mutex::new(Book {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Every order submitted so far, in order.
    pub fn submitted(&self) -> Vec<LimitOrder> {
        self.lock().submitted.clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.lock().cancels
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The order's state as of `now`, ignoring cancellation.
    fn live_snapshot(&self, sim: &SimOrder, now: Instant) -> OrderSnapshot {
        let elapsed = now.saturating_duration_since(sim.submitted_at);
        let filled = match self.settings.fill_delay_ms {
            Some(delay)
                if elapsed >= Duration::from_millis(delay)
                    && self.settings.cancel_after_ms.is_none_or(|after| delay < after) =>
            {
                let ratio = self
                    .settings
                    .partial_fill_ratio
                    .unwrap_or(Decimal::ONE)
                    .clamp(Decimal::ZERO, Decimal::ONE);
                sim.order.quantity * ratio
            }
            _ => Decimal::ZERO,
        };

        let avg_price = if filled > Decimal::ZERO {
            self.settings.fill_price.unwrap_or(sim.order.price)
        } else {
            Decimal::ZERO
        };
        let state = if filled >= sim.order.quantity {
            OrderState::Filled
        } else {
            OrderState::Open
        };
        let snapshot = OrderSnapshot {
            filled_quantity: filled,
            avg_price,
            state,
        };

        match self.settings.cancel_after_ms {
            Some(after) if state == OrderState::Open && elapsed >= Duration::from_millis(after) => {
                OrderSnapshot {
                    state: OrderState::Cancelled,
                    ..snapshot
                }
            }
            _ => snapshot,
        }
    }
}

#[async_trait]
impl ExchangeClient for SimulatedExchange {
    fn name(&self) -> &'static str {
        "SimulatedExchange"
    }

    async fn submit(&self, order: &LimitOrder) -> Result<OrderId> {
        let mut book = self.lock();
        let id = book.next_id;
        book.next_id += 1;
        book.submitted.push(order.clone());
        book.orders.insert(
            id,
            SimOrder {
                order: order.clone(),
                submitted_at: Instant::now(),
                frozen: None,
            },
        );
        tracing::debug!(%id, symbol = %order.symbol, price = %order.price, quantity = %order.quantity, "Simulated order accepted.");
        Ok(OrderId {
            symbol: order.symbol.clone(),
            id,
        })
    }

    async fn poll_status(&self, order_id: &OrderId) -> Result<OrderSnapshot> {
        let book = self.lock();
        let sim = book
            .orders
            .get(&order_id.id)
            .ok_or_else(|| Error::UnknownOrder(order_id.clone()))?;
        Ok(match sim.frozen {
            Some(snapshot) => snapshot,
            None => self.live_snapshot(sim, Instant::now()),
        })
    }

    async fn cancel(&self, order_id: &OrderId) -> Result<()> {
        let now = Instant::now();
        let mut book = self.lock();
        book.cancels += 1;
        let snapshot = {
            let sim = book
                .orders
                .get(&order_id.id)
                .ok_or_else(|| Error::UnknownOrder(order_id.clone()))?;
            if sim.frozen.is_some() {
                return Ok(());
            }
            self.live_snapshot(sim, now)
        };
        let frozen = match snapshot.state {
            OrderState::Filled => snapshot,
            OrderState::Open | OrderState::Cancelled => OrderSnapshot {
                state: OrderState::Cancelled,
                ..snapshot
            },
        };
        if let Some(sim) = book.orders.get_mut(&order_id.id) {
            sim.frozen = Some(frozen);
        }
        Ok(())
    }
}
