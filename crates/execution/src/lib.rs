// In crates/execution/src/lib.rs

use async_trait::async_trait;
use core_types::{ExecutionReport, Symbol};

pub mod error;
pub mod executor;
pub mod live;
pub mod simulated;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use executor::LimitOrderExecutor;
pub use live::LiveExchange;
pub use simulated::SimulatedExchange;
pub use types::{
    ExecutionGate, LimitOrder, OrderId, OrderRequest, OrderSnapshot, OrderState,
    SimulationSettings,
};

/// The order operations the lifecycle needs from an exchange.
///
/// Implementations never interpret decisions; they only move limit orders.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// The name of the exchange backend (e.g., "LiveExchange", "SimulatedExchange").
    fn name(&self) -> &'static str;

    /// Account-side preparation before the first order of a lifecycle, such
    /// as setting leverage. Backends without such state do nothing.
    async fn prepare(&self, _symbol: &Symbol, _leverage: u32) -> Result<()> {
        Ok(())
    }

    /// Places a limit order and returns its identifier.
    async fn submit(&self, order: &LimitOrder) -> Result<OrderId>;

    /// Reports cumulative fills and the state of an order.
    async fn poll_status(&self, order_id: &OrderId) -> Result<OrderSnapshot>;

    /// Cancels whatever is still resting. Cancelling an order that already
    /// reached a final state is not an error.
    async fn cancel(&self, order_id: &OrderId) -> Result<()>;
}

/// The universal interface for an execution handler.
///
/// An `Executor` takes a sized `OrderRequest` through its whole lifecycle
/// and returns exactly one report, whatever the outcome. Only failures to
/// talk to the exchange are errors.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The name of the executor (e.g., "LimitOrderExecutor").
    fn name(&self) -> &'static str;

    /// Executes a given order request.
    ///
    /// # Arguments
    ///
    /// * `request`: A reference to the `OrderRequest` to be executed.
    ///
    /// # Returns
    ///
    /// A `Result` containing the terminal `ExecutionReport`, or an `Error`
    /// if the exchange could not be reached.
    async fn execute(&self, request: &OrderRequest) -> Result<ExecutionReport>;
}
