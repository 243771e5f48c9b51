// In crates/api-client/src/types.rs

use core_types::{OpenPosition, Side, Symbol};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

/// The main client for the futures REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The persistent HTTP client.
    pub http_client: Client,
    pub api_key: String,
    pub secret_key: String,
    /// The base URL of the futures REST API.
    pub base_url: String,
    /// `recvWindow` sent with every signed request, in milliseconds.
    pub recv_window_ms: u64,
}

/// A single asset's balance in the futures account.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FuturesAsset {
    pub asset: String,
    pub wallet_balance: Decimal,
    pub unrealized_profit: Decimal,
    pub margin_balance: Decimal,
    pub available_balance: Decimal,
}

/// A position slot as returned by the account endpoint. Flat slots have a
/// zero `position_amt`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    pub symbol: String,
    /// Positive for long, negative for short.
    pub position_amt: Decimal,
    #[serde(default)]
    pub entry_price: Decimal,
    #[serde(default)]
    pub unrealized_profit: Decimal,
    /// "LONG", "SHORT", or "BOTH" in one-way mode.
    #[serde(default)]
    pub position_side: String,
}

impl PositionInfo {
    pub fn side(&self) -> Option<Side> {
        match self.position_side.as_str() {
            "LONG" => Some(Side::Long),
            "SHORT" => Some(Side::Short),
            _ if self.position_amt > Decimal::ZERO => Some(Side::Long),
            _ if self.position_amt < Decimal::ZERO => Some(Side::Short),
            _ => None,
        }
    }
}

/// The futures account as returned by `GET /fapi/v2/account`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub assets: Vec<FuturesAsset>,
    #[serde(default)]
    pub positions: Vec<PositionInfo>,
    pub total_wallet_balance: Decimal,
    pub total_unrealized_profit: Decimal,
    pub total_margin_balance: Decimal,
    #[serde(default)]
    pub total_initial_margin: Decimal,
    pub available_balance: Decimal,
}

impl AccountInfo {
    /// Folds the exchange view into the snapshot a decision cycle works on.
    pub fn to_account_state(&self) -> core_types::AccountState {
        let total_equity = self.total_wallet_balance + self.total_unrealized_profit;
        let margin_used_pct = if total_equity > Decimal::ZERO {
            (self.total_initial_margin / total_equity * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let positions: Vec<OpenPosition> = self
            .positions
            .iter()
            .filter(|p| !p.position_amt.is_zero())
            .filter_map(|p| {
                p.side().map(|side| OpenPosition {
                    symbol: Symbol::new(&p.symbol),
                    side,
                })
            })
            .collect();

        core_types::AccountState {
            total_equity,
            available_balance: self.available_balance,
            margin_used_pct,
            position_count: positions.len(),
            positions,
        }
    }
}

/// Order state as reported by the order endpoints.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    ExpiredInMatch,
}

/// `timeInForce` for limit orders. `Gtx` is the exchange's post-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Gtc,
    Gtx,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Gtx => "GTX",
        }
    }
}

/// Response of the place, query and cancel order endpoints.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: u64,
    pub symbol: String,
    pub status: OrderStatus,
    pub side: String,
    pub price: Decimal,
    /// Zero until something fills.
    pub avg_price: Decimal,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MarkPrice {
    pub symbol: String,
    pub mark_price: Decimal,
}
