// In crates/execution/src/live.rs

use crate::types::{LimitOrder, OrderId, OrderSnapshot, OrderState};
use crate::{ExchangeClient, Result};
use api_client::{ApiClient, OrderResponse, OrderStatus, TimeInForce};
use async_trait::async_trait;
use core_types::Symbol;

/// Exchange error code for an order that no longer exists, typically
/// because it filled or was cancelled a moment earlier.
const UNKNOWN_ORDER_CODE: i64 = -2011;

/// The exchange backend that talks to the real futures venue through
/// [`ApiClient`].
#[derive(Debug, Clone)]
pub struct LiveExchange {
    api_client: ApiClient,
}

impl LiveExchange {
    pub fn new(api_client: ApiClient) -> Self {
        Self { api_client }
    }
}

fn snapshot(response: &OrderResponse) -> OrderSnapshot {
    let state = match response.status {
        OrderStatus::New | OrderStatus::PartiallyFilled => OrderState::Open,
        OrderStatus::Filled => OrderState::Filled,
        OrderStatus::Canceled
        | OrderStatus::Rejected
        | OrderStatus::Expired
        | OrderStatus::ExpiredInMatch => OrderState::Cancelled,
    };
    OrderSnapshot {
        filled_quantity: response.executed_qty,
        avg_price: response.avg_price,
        state,
    }
}

#[async_trait]
impl ExchangeClient for LiveExchange {
    fn name(&self) -> &'static str {
        "LiveExchange"
    }

    async fn prepare(&self, symbol: &Symbol, leverage: u32) -> Result<()> {
        self.api_client.set_leverage(symbol, leverage).await?;
        tracing::info!(%symbol, leverage, "Leverage set.");
        Ok(())
    }

    async fn submit(&self, order: &LimitOrder) -> Result<OrderId> {
        let time_in_force = if order.post_only {
            TimeInForce::Gtx
        } else {
            TimeInForce::Gtc
        };
        let response = self
            .api_client
            .place_limit_order(
                &order.symbol,
                order.side,
                order.price,
                order.quantity,
                time_in_force,
            )
            .await?;
        tracing::info!(order_id = response.order_id, symbol = %order.symbol, status = ?response.status, "Limit order placed.");
        Ok(OrderId {
            symbol: order.symbol.clone(),
            id: response.order_id,
        })
    }

    async fn poll_status(&self, order_id: &OrderId) -> Result<OrderSnapshot> {
        let response = self
            .api_client
            .query_order(&order_id.symbol, order_id.id)
            .await?;
        Ok(snapshot(&response))
    }

    async fn cancel(&self, order_id: &OrderId) -> Result<()> {
        match self
            .api_client
            .cancel_order(&order_id.symbol, order_id.id)
            .await
        {
            Ok(_) => Ok(()),
            Err(api_client::Error::ApiError { code, msg }) if code == UNKNOWN_ORDER_CODE => {
                tracing::debug!(%order_id, %msg, "Order already final at cancel time.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
