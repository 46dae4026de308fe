use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

use crate::config::{TradingConfig, TradingCredentials};

type HmacSha256 = Hmac<Sha256>;

/// Venue acknowledgement for an accepted order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub symbol: String,
    pub order_id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub executed_qty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VenueError {
    code: i64,
    msg: String,
}

/// Spot order placement.
#[async_trait]
pub trait OrderVenue: Send + Sync {
    async fn market_buy(&self, symbol: &str, quantity: f64) -> eyre::Result<OrderAck>;
}

/// Signed REST client for Binance spot (`/api/v3/order`).
pub struct BinanceVenue {
    client: reqwest::Client,
    base_url: String,
    credentials: TradingCredentials,
}

impl BinanceVenue {
    pub fn new(config: &TradingConfig, credentials: TradingCredentials) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| eyre::eyre!("Failed to build venue HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn sign(&self, payload: &str) -> eyre::Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| eyre::eyre!("Invalid API secret: {}", e))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Form-encoded market buy parameters, in the order they are signed.
fn order_payload(symbol: &str, quantity: f64, timestamp: i64) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("symbol", symbol)
        .append_pair("side", "BUY")
        .append_pair("type", "MARKET")
        .append_pair("quantity", &quantity.to_string())
        .append_pair("timestamp", &timestamp.to_string())
        .finish()
}

#[async_trait]
impl OrderVenue for BinanceVenue {
    async fn market_buy(&self, symbol: &str, quantity: f64) -> eyre::Result<OrderAck> {
        let payload = order_payload(symbol, quantity, chrono::Utc::now().timestamp_millis());
        let signature = self.sign(&payload)?;

        let resp = self
            .client
            .post(format!("{}/api/v3/order", self.base_url))
            .header("X-MBX-APIKEY", &self.credentials.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!("{}&signature={}", payload, signature))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(match serde_json::from_str::<VenueError>(&body) {
                Ok(err) => eyre::eyre!("Order rejected ({}): {} {}", status, err.code, err.msg),
                Err(_) => eyre::eyre!("Order rejected ({}): {}", status, body),
            });
        }

        serde_json::from_str(&body).map_err(|e| eyre::eyre!("Malformed order response: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn venue(server: &MockServer) -> BinanceVenue {
        let config = TradingConfig {
            test_base_url: server.base_url(),
            timeout_secs: 2,
            ..TradingConfig::default()
        };
        let credentials = TradingCredentials {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        };
        BinanceVenue::new(&config, credentials).unwrap()
    }

    #[test]
    fn signature_is_hex_hmac_sha256() {
        let server = MockServer::start();
        // HMAC-SHA256("secret", "abc")
        assert_eq!(
            venue(&server).sign("abc").unwrap(),
            "9946dad4e00e913fc8be8e5d3f7e110a4a9e832f83fb09c345285d78638d8a0e"
        );
    }

    #[tokio::test]
    async fn places_signed_market_buy() {
        let server = MockServer::start();
        let order = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v3/order")
                .header("X-MBX-APIKEY", "key")
                .body_contains("symbol=PEPEUSDT&side=BUY&type=MARKET&quantity=10&timestamp=")
                .body_contains("&signature=");
            then.status(200).json_body(json!({
                "symbol": "PEPEUSDT",
                "orderId": 28,
                "status": "FILLED",
                "executedQty": "10.00000000"
            }));
        });

        let ack = venue(&server).market_buy("PEPEUSDT", 10.0).await.unwrap();
        assert_eq!(ack.order_id, 28);
        assert_eq!(ack.status.as_deref(), Some("FILLED"));
        order.assert();
    }

    #[test]
    fn payload_encodes_hostile_symbol() {
        let payload = order_payload("PEPE COIN&TYPE=LIMITUSDT", 10.0, 1);
        assert_eq!(
            payload,
            "symbol=PEPE+COIN%26TYPE%3DLIMITUSDT&side=BUY&type=MARKET&quantity=10&timestamp=1"
        );
        let params: Vec<(String, String)> = url::form_urlencoded::parse(payload.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(params.len(), 5);
        assert_eq!(params[0].1, "PEPE COIN&TYPE=LIMITUSDT");
    }

    #[tokio::test]
    async fn sends_encoded_symbol_in_signed_body() {
        let server = MockServer::start();
        let order = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v3/order")
                .body_contains("symbol=PEPE+COIN%26TYPE%3DLIMITUSDT&side=BUY&type=MARKET")
                .body_contains("&signature=");
            then.status(200)
                .json_body(json!({ "symbol": "PEPE COIN&TYPE=LIMITUSDT", "orderId": 7 }));
        });
        let raw = server.mock(|when, then| {
            when.method(POST).body_contains("TYPE=LIMIT");
            then.status(400)
                .json_body(json!({ "code": -1100, "msg": "Illegal characters." }));
        });

        let ack = venue(&server)
            .market_buy("PEPE COIN&TYPE=LIMITUSDT", 10.0)
            .await
            .unwrap();
        assert_eq!(ack.order_id, 7);
        order.assert();
        assert_eq!(raw.hits(), 0);
    }

    #[tokio::test]
    async fn venue_error_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v3/order");
            then.status(400)
                .json_body(json!({ "code": -1121, "msg": "Invalid symbol." }));
        });

        let err = venue(&server).market_buy("NOPEUSDT", 10.0).await.unwrap_err();
        assert!(err.to_string().contains("Invalid symbol."));
    }
}
