//! GoDark HTTP Client
//!
//! HTTP client wrapper for the GoDark trading REST API. Every endpoint
//! answers with the standard envelope `{timestamp, code, data, message?}`;
//! non-2xx responses decode into a typed service error and are never
//! retried here.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::{Config, DEFAULT_API_URL};
use crate::error::{ApiError, ApiResult};

const HANDSHAKE_HEADER: &str = "Handshake-Token";

/// GoDark REST API client
///
/// Wraps reqwest::Client with the GoDark base URL, timeout, user-agent,
/// and the optional handshake token used for authenticated endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    handshake_token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("handshake_token", &self.handshake_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ApiClient {
    /// Creates a client for `base_url` with a 10 second timeout and no
    /// handshake token.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("godark-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            handshake_token: None,
        }
    }

    /// Creates a client from the loaded configuration, picking up the base
    /// URL and handshake token.
    pub fn from_config(config: &Config) -> Self {
        let mut api = Self::new(config.api_url.clone());
        api.handshake_token = config.handshake_token.clone();
        api
    }

    /// Sets the handshake token sent with every request.
    pub fn set_handshake_token(&mut self, token: impl Into<String>) {
        self.handshake_token = Some(token.into());
    }

    /// Returns the configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<ApiEnvelope<T>> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "GoDark API GET");

        let mut req = self.client.get(&url);
        if let Some(token) = &self.handshake_token {
            req = req.header(HANDSHAKE_HEADER, token);
        }

        Self::decode_response(req.send().await?).await
    }

    async fn post<T, B>(&self, endpoint: &str, body: &B) -> ApiResult<ApiEnvelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "GoDark API POST");

        let mut req = self.client.post(&url).json(body);
        if let Some(token) = &self.handshake_token {
            req = req.header(HANDSHAKE_HEADER, token);
        }

        Self::decode_response(req.send().await?).await
    }

    async fn decode_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> ApiResult<ApiEnvelope<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(decode_error(status, &body));
        }

        response
            .json::<ApiEnvelope<T>>()
            .await
            .map_err(ApiError::from)
    }

    /// Register a new account
    ///
    /// Calls POST /create-account
    pub async fn create_account(
        &self,
        request: &CreateAccountRequest,
    ) -> ApiResult<ApiEnvelope<CreateAccountResponse>> {
        self.post("/create-account", request).await
    }

    /// Look up the account id behind the handshake token
    ///
    /// Calls POST /get-account-id
    pub async fn get_account_id(&self) -> ApiResult<ApiEnvelope<AccountIdResponse>> {
        self.post("/get-account-id", &json!({})).await
    }

    /// Issue a new API key for the account
    ///
    /// Calls POST /create-api-key
    pub async fn create_api_key(
        &self,
        request: &CreateApiKeyRequest,
    ) -> ApiResult<ApiEnvelope<CreateApiKeyResponse>> {
        self.post("/create-api-key", request).await
    }

    /// List tradeable instruments
    ///
    /// Calls GET /get-instruments
    pub async fn get_instruments(&self) -> ApiResult<ApiEnvelope<Vec<Instrument>>> {
        self.get("/get-instruments").await
    }

    /// Current national best bid and offer used for order protection
    ///
    /// Calls GET /nbbo/status
    pub async fn nbbo_status(&self) -> ApiResult<ApiEnvelope<NbboStatus>> {
        self.get("/nbbo/status").await
    }

    /// Place an order
    ///
    /// Calls POST /place
    ///
    /// # Errors
    /// * `ApiError::Service` - Rejected orders, with the venue's code and message
    /// * `ApiError::Connection` / `ApiError::Timeout` - Transport failures; the
    ///   order state is unknown and the caller decides whether to retry
    pub async fn place_order(
        &self,
        order: &PlaceOrderRequest,
    ) -> ApiResult<ApiEnvelope<OrderResponse>> {
        self.post("/place", order).await
    }

    /// Cancel a resting order
    ///
    /// Calls POST /cancel
    pub async fn cancel_order(
        &self,
        order_id: &str,
    ) -> ApiResult<ApiEnvelope<Option<serde_json::Value>>> {
        self.post("/cancel", &json!({ "order_id": order_id })).await
    }

    /// Modify a resting order's price or quantity
    ///
    /// Calls POST /modify
    pub async fn modify_order(
        &self,
        request: &ModifyOrderRequest,
    ) -> ApiResult<ApiEnvelope<OrderResponse>> {
        self.post("/modify", request).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Map a non-2xx response to a service error.
///
/// The body is expected to carry `{code, message, timestamp}`; when it does
/// not parse, the HTTP status stands in for both code and message.
fn decode_error(status: StatusCode, body: &str) -> ApiError {
    #[derive(Deserialize, Default)]
    struct ErrorBody {
        code: Option<i64>,
        message: Option<String>,
        timestamp: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code.unwrap_or_else(|| i64::from(status.as_u16()));
    let message = parsed.message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    ApiError::Service {
        code,
        message,
        timestamp: parsed.timestamp,
    }
}

/// Standard GoDark response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub timestamp: String,
    pub code: i64,
    pub data: T,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    PegMid,
    PegBid,
    PegAsk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Ioc,
    Fok,
    Gtd,
    Gtc,
}

/// Dark orders rest hidden; lit orders display on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Dark,
    Lit,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub leverage: u32,
    pub time_in_force: TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_or_none: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_qty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbbo_protection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub good_till_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifyOrderRequest {
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub algorithm_id: Option<String>,
    pub status: String,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub filled_quantity: f64,
    pub price: Option<f64>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(rename = "type")]
    pub instrument_type: String,
    pub status: String,
    pub min_quantity: f64,
    pub max_quantity: f64,
    pub tick_size: f64,
    pub lot_size: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NbboStatus {
    pub symbol: String,
    pub best_bid: f64,
    pub best_ask: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountRequest {
    pub email: String,
    pub password: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountResponse {
    pub email: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountIdResponse {
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateApiKeyRequest {
    pub key_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_whitelist: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKeyResponse {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_order_wire_names() {
        let order = PlaceOrderRequest {
            symbol: "BTC-USDT-PERP".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::PegMid,
            quantity: 0.5,
            price: None,
            leverage: 5,
            time_in_force: TimeInForce::Ioc,
            all_or_none: Some(true),
            min_qty: None,
            nbbo_protection: None,
            visibility: Some(Visibility::Dark),
            good_till_date: None,
        };

        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["side"], "buy");
        assert_eq!(value["order_type"], "peg_mid");
        assert_eq!(value["time_in_force"], "IOC");
        assert_eq!(value["visibility"], "dark");
        assert_eq!(value["all_or_none"], true);

        // Unset options are omitted, not sent as null
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("price"));
        assert!(!obj.contains_key("min_qty"));
        assert!(!obj.contains_key("nbbo_protection"));
        assert!(!obj.contains_key("good_till_date"));
    }

    #[test]
    fn test_envelope_decode() {
        let json = r#"{
            "timestamp": "2025-01-15T10:30:00Z",
            "code": 200,
            "data": {"account_id": "acct-123"}
        }"#;

        let envelope: ApiEnvelope<AccountIdResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.data.account_id, "acct-123");
        assert!(envelope.message.is_none());
    }

    #[test]
    fn test_decode_error_with_json_body() {
        let err = decode_error(
            StatusCode::BAD_REQUEST,
            r#"{"code": 4001, "message": "insufficient margin", "timestamp": "2025-01-15T10:30:00Z"}"#,
        );

        match err {
            ApiError::Service {
                code,
                message,
                timestamp,
            } => {
                assert_eq!(code, 4001);
                assert_eq!(message, "insufficient margin");
                assert_eq!(timestamp.as_deref(), Some("2025-01-15T10:30:00Z"));
            }
            other => panic!("expected Service, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_with_plain_body() {
        let err = decode_error(StatusCode::BAD_GATEWAY, "upstream exploded");

        match err {
            ApiError::Service {
                code,
                message,
                timestamp,
            } => {
                assert_eq!(code, 502);
                assert_eq!(message, "Bad Gateway");
                assert!(timestamp.is_none());
            }
            other => panic!("expected Service, got {:?}", other),
        }
        assert!(!decode_error(StatusCode::BAD_GATEWAY, "").is_retryable());
    }

    #[test]
    fn test_debug_masks_token() {
        let mut client = ApiClient::new("https://example.test");
        client.set_handshake_token("super-secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }
}
