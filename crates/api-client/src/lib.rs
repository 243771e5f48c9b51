// In crates/api-client/src/lib.rs

use app_config::types::ExchangeSettings;
use chrono::Utc;
use core_types::{Side, Symbol};
use hmac::{Hmac, Mac};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::Sha256;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

pub mod error;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use types::*;

impl ApiClient {
    /// Constructs a new ApiClient from the `[exchange]` settings.
    pub fn new(settings: &ExchangeSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;
        Ok(ApiClient {
            http_client,
            api_key: settings.api_key.clone(),
            secret_key: settings.secret_key.clone(),
            base_url: settings.rest_base_url.trim_end_matches('/').to_string(),
            recv_window_ms: settings.recv_window_ms,
        })
    }

    /// Generates a hex HMAC-SHA256 signature for a query string.
    fn sign(&self, query_string: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Appends `recvWindow`, `timestamp` and the signature to `params`.
    fn create_signed_query(&self, params: &mut String) {
        let timestamp = Utc::now().timestamp_millis();
        if !params.is_empty() {
            params.push('&');
        }
        params.push_str(&format!(
            "recvWindow={}&timestamp={}",
            self.recv_window_ms, timestamp
        ));
        let signature = self.sign(params);
        params.push_str(&format!("&signature={}", signature));
    }

    /// Sends a signed request and decodes the body.
    ///
    /// The exchange reports failures as `{"code": <negative>, "msg": ...}` with
    /// varying HTTP statuses, so the body is checked before decoding.
    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: String,
    ) -> Result<T> {
        self.create_signed_query(&mut params);
        let url = format!("{}{}", self.base_url, path);

        let request = if method == Method::POST {
            self.http_client
                .post(&url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(params)
        } else {
            self.http_client.request(method, format!("{url}?{params}"))
        };

        let text = request
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(Error::RequestFailed)?
            .text()
            .await
            .map_err(Error::RequestFailed)?;
        decode_response(&text)
    }

    /// Fetches the futures account.
    ///
    /// This corresponds to the `GET /fapi/v2/account` endpoint.
    pub async fn get_account(&self) -> Result<AccountInfo> {
        self.send_signed(Method::GET, "/fapi/v2/account", String::new())
            .await
    }

    /// Fetches the current mark price. Public endpoint, no signature.
    pub async fn get_mark_price(&self, symbol: &Symbol) -> Result<Decimal> {
        let url = format!("{}/fapi/v1/premiumIndex?symbol={}", self.base_url, symbol);
        let text = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(Error::RequestFailed)?
            .text()
            .await
            .map_err(Error::RequestFailed)?;
        let mark: MarkPrice = decode_response(&text)?;
        Ok(mark.mark_price)
    }

    pub async fn set_leverage(&self, symbol: &Symbol, leverage: u32) -> Result<()> {
        let params = format!("symbol={}&leverage={}", symbol, leverage);
        let _: Value = self
            .send_signed(Method::POST, "/fapi/v1/leverage", params)
            .await?;
        Ok(())
    }

    /// Places a limit order.
    /// Corresponds to `POST /fapi/v1/order`.
    pub async fn place_limit_order(
        &self,
        symbol: &Symbol,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderResponse> {
        let (side_str, position_side) = match side {
            Side::Long => ("BUY", "LONG"),
            Side::Short => ("SELL", "SHORT"),
        };
        let params = format!(
            "symbol={}&side={}&positionSide={}&type=LIMIT&timeInForce={}&price={}&quantity={}&newOrderRespType=RESULT",
            symbol,
            side_str,
            position_side,
            time_in_force.as_str(),
            price.normalize(),
            quantity.normalize()
        );
        tracing::debug!(%symbol, %side, %price, %quantity, tif = time_in_force.as_str(), "Placing limit order.");
        self.send_signed(Method::POST, "/fapi/v1/order", params).await
    }

    /// Corresponds to `GET /fapi/v1/order`.
    pub async fn query_order(&self, symbol: &Symbol, order_id: u64) -> Result<OrderResponse> {
        let params = format!("symbol={}&orderId={}", symbol, order_id);
        self.send_signed(Method::GET, "/fapi/v1/order", params).await
    }

    /// Corresponds to `DELETE /fapi/v1/order`.
    pub async fn cancel_order(&self, symbol: &Symbol, order_id: u64) -> Result<OrderResponse> {
        let params = format!("symbol={}&orderId={}", symbol, order_id);
        self.send_signed(Method::DELETE, "/fapi/v1/order", params)
            .await
    }
}

fn decode_response<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value: Value = serde_json::from_str(text).map_err(Error::DeserializationFailed)?;
    if let Some(code) = value.get("code").and_then(Value::as_i64) {
        // `set_leverage` and a few others echo `code: 200` on success.
        if code < 0 {
            let msg = value
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return Err(Error::ApiError { code, msg });
        }
    }
    serde_json::from_value(value).map_err(Error::DeserializationFailed)
}

// Free function to allow api_client::new usage
pub fn new(settings: &ExchangeSettings) -> Result<ApiClient> {
    ApiClient::new(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn client(secret: &str) -> ApiClient {
        ApiClient {
            http_client: reqwest::Client::new(),
            api_key: "key".to_string(),
            secret_key: secret.to_string(),
            base_url: "https://example.invalid".to_string(),
            recv_window_ms: 5000,
        }
    }

    #[test]
    fn test_signature_matches_exchange_reference() {
        let client = client("NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j");
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            client.sign(query),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signed_query_ends_with_signature() {
        let client = client("secret");
        let mut params = "symbol=BTCUSDT".to_string();
        client.create_signed_query(&mut params);

        assert!(params.starts_with("symbol=BTCUSDT&recvWindow=5000&timestamp="));
        let (_, signature) = params.rsplit_once("&signature=").unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_error_body_becomes_api_error() {
        let err = decode_response::<OrderResponse>(r#"{"code": -2019, "msg": "Margin is insufficient."}"#)
            .unwrap_err();
        match err {
            Error::ApiError { code, msg } => {
                assert_eq!(code, -2019);
                assert_eq!(msg, "Margin is insufficient.");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_order_response_decodes_string_numbers() {
        let order: OrderResponse = decode_response(
            r#"{"orderId": 283194212, "symbol": "BTCUSDT", "status": "PARTIALLY_FILLED",
                "side": "BUY", "price": "100000.0", "avgPrice": "99998.5",
                "origQty": "0.010", "executedQty": "0.004", "type": "LIMIT"}"#,
        )
        .unwrap();

        assert_eq!(order.order_id, 283194212);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.executed_qty, dec!(0.004));
        assert_eq!(order.avg_price, dec!(99998.5));
    }

    #[test]
    fn test_account_info_to_account_state() {
        let info: AccountInfo = serde_json::from_str(
            r#"{
                "totalWalletBalance": "480.00",
                "totalUnrealizedProfit": "20.00",
                "totalMarginBalance": "500.00",
                "totalInitialMargin": "50.00",
                "availableBalance": "450.00",
                "positions": [
                    {"symbol": "BTCUSDT", "positionAmt": "0.005", "positionSide": "LONG"},
                    {"symbol": "ETHUSDT", "positionAmt": "-0.2", "positionSide": "BOTH"},
                    {"symbol": "SOLUSDT", "positionAmt": "0", "positionSide": "BOTH"}
                ]
            }"#,
        )
        .unwrap();
        let state = info.to_account_state();

        assert_eq!(state.total_equity, dec!(500));
        assert_eq!(state.margin_used_pct, dec!(10));
        assert_eq!(state.position_count, 2);
        assert!(state.holds(&Symbol::new("BTCUSDT"), Side::Long));
        assert!(state.holds(&Symbol::new("ETHUSDT"), Side::Short));
    }
}
