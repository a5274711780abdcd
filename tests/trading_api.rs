// Integration tests for the GoDark trading REST client
//
// Each test stands up a local HTTP server speaking the GoDark envelope and
// verifies:
// - Envelope decoding on success and the typed error on non-2xx
// - The Handshake-Token header riding every authenticated request
// - Wire naming of order fields (lowercase sides, snake_case types)
// - Transport failures mapping to retryable connection errors

use std::net::SocketAddr;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use godark_client::error::ApiError;
use godark_client::trading::{
    ApiClient, CreateAccountRequest, CreateApiKeyRequest, ModifyOrderRequest, OrderSide,
    OrderType, PlaceOrderRequest, TimeInForce,
};

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn limit_buy() -> PlaceOrderRequest {
    PlaceOrderRequest {
        symbol: "BTC-USDT-PERP".to_string(),
        side: OrderSide::Buy,
        order_type: OrderType::Limit,
        quantity: 0.5,
        price: Some(100_000.0),
        leverage: 5,
        time_in_force: TimeInForce::Gtc,
        all_or_none: None,
        min_qty: None,
        nbbo_protection: Some(true),
        visibility: None,
        good_till_date: None,
    }
}

#[tokio::test]
async fn test_place_order_sends_token_and_wire_names() {
    let router = Router::new().route(
        "/place",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let token = headers
                .get("Handshake-Token")
                .and_then(|v| v.to_str().ok());
            if token != Some("tok-1") {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            if body["side"] != "buy" || body["order_type"] != "limit" {
                return StatusCode::BAD_REQUEST.into_response();
            }
            Json(json!({
                "timestamp": "2025-01-15T10:30:00Z",
                "code": 200,
                "data": {
                    "order_id": "ord-1",
                    "algorithm_id": null,
                    "status": "accepted",
                    "symbol": body["symbol"],
                    "side": body["side"],
                    "quantity": body["quantity"],
                    "filled_quantity": 0.0,
                    "price": body["price"],
                    "timestamp": "2025-01-15T10:30:00Z"
                }
            }))
            .into_response()
        }),
    );
    let addr = serve(router).await;

    let mut client = ApiClient::new(format!("http://{}", addr));
    client.set_handshake_token("tok-1");

    let envelope = client.place_order(&limit_buy()).await.unwrap();
    assert_eq!(envelope.code, 200);
    assert_eq!(envelope.data.order_id, "ord-1");
    assert_eq!(envelope.data.status, "accepted");
    assert_eq!(envelope.data.side, "buy");
    assert_eq!(envelope.data.price, Some(100_000.0));
}

#[tokio::test]
async fn test_rejected_order_decodes_service_error() {
    let router = Router::new().route(
        "/place",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "code": 4001,
                    "message": "insufficient margin",
                    "timestamp": "2025-01-15T10:30:00Z"
                })),
            )
        }),
    );
    let addr = serve(router).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let err = client.place_order(&limit_buy()).await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(err.error_type(), "service_error");
    match err {
        ApiError::Service { code, message, .. } => {
            assert_eq!(code, 4001);
            assert_eq!(message, "insufficient margin");
        }
        other => panic!("expected Service, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_json_error_body_falls_back_to_status() {
    let router = Router::new().route(
        "/place",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let addr = serve(router).await;
    let client = ApiClient::new(format!("http://{}", addr));

    match client.place_order(&limit_buy()).await.unwrap_err() {
        ApiError::Service { code, message, .. } => {
            assert_eq!(code, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("expected Service, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_instruments() {
    let router = Router::new().route(
        "/get-instruments",
        get(|| async {
            Json(json!({
                "timestamp": "2025-01-15T10:30:00Z",
                "code": 200,
                "data": [{
                    "symbol": "BTC-USDT-PERP",
                    "base_asset": "BTC",
                    "quote_asset": "USDT",
                    "type": "perpetual",
                    "status": "trading",
                    "min_quantity": 0.001,
                    "max_quantity": 100.0,
                    "tick_size": 0.1,
                    "lot_size": 0.001
                }]
            }))
        }),
    );
    let addr = serve(router).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let envelope = client.get_instruments().await.unwrap();
    assert_eq!(envelope.data.len(), 1);
    let instrument = &envelope.data[0];
    assert_eq!(instrument.symbol, "BTC-USDT-PERP");
    assert_eq!(instrument.instrument_type, "perpetual");
    assert_eq!(instrument.tick_size, 0.1);
}

#[tokio::test]
async fn test_unreachable_api_is_retryable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(format!("http://{}", addr));
    let err = client.get_instruments().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.error_type(), "connection_error");
}

#[tokio::test]
async fn test_cancel_and_modify() {
    let router = Router::new()
        .route(
            "/cancel",
            post(|Json(body): Json<Value>| async move {
                if body["order_id"] != "ord-1" {
                    return StatusCode::BAD_REQUEST.into_response();
                }
                Json(json!({
                    "timestamp": "2025-01-15T10:30:00Z",
                    "code": 200,
                    "data": null,
                    "message": "cancelled"
                }))
                .into_response()
            }),
        )
        .route(
            "/modify",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "timestamp": "2025-01-15T10:30:00Z",
                    "code": 200,
                    "data": {
                        "order_id": body["order_id"],
                        "algorithm_id": null,
                        "status": "accepted",
                        "symbol": "BTC-USDT-PERP",
                        "side": "buy",
                        "quantity": body["quantity"],
                        "filled_quantity": 0.0,
                        "price": body["price"],
                        "timestamp": "2025-01-15T10:30:00Z"
                    }
                }))
            }),
        );
    let addr = serve(router).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let cancelled = client.cancel_order("ord-1").await.unwrap();
    assert_eq!(cancelled.code, 200);
    assert!(cancelled.data.is_none());
    assert_eq!(cancelled.message.as_deref(), Some("cancelled"));

    let modified = client
        .modify_order(&ModifyOrderRequest {
            order_id: "ord-1".to_string(),
            quantity: Some(0.75),
            price: Some(99_500.0),
        })
        .await
        .unwrap();
    assert_eq!(modified.data.order_id, "ord-1");
    assert_eq!(modified.data.quantity, 0.75);
    assert_eq!(modified.data.price, Some(99_500.0));
}

#[tokio::test]
async fn test_account_endpoints() {
    let router = Router::new()
        .route(
            "/create-account",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "timestamp": "2025-01-15T10:30:00Z",
                    "code": 200,
                    "data": {
                        "email": body["email"],
                        "account_id": "acct-1"
                    }
                }))
            }),
        )
        .route(
            "/get-account-id",
            post(|| async {
                Json(json!({
                    "timestamp": "2025-01-15T10:30:00Z",
                    "code": 200,
                    "data": {"account_id": "acct-1"}
                }))
            }),
        )
        .route(
            "/create-api-key",
            post(|Json(body): Json<Value>| async move {
                if body["key_name"] != "bot" {
                    return StatusCode::BAD_REQUEST.into_response();
                }
                Json(json!({
                    "timestamp": "2025-01-15T10:30:00Z",
                    "code": 200,
                    "data": {
                        "api_key": "key",
                        "secret_key": "secret",
                        "passphrase": "phrase"
                    }
                }))
                .into_response()
            }),
        );
    let addr = serve(router).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let created = client
        .create_account(&CreateAccountRequest {
            email: "trader@example.com".to_string(),
            password: "hunter2!".to_string(),
            account_name: "main".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(created.data.account_id, "acct-1");
    assert_eq!(created.data.email, "trader@example.com");

    let account = client.get_account_id().await.unwrap();
    assert_eq!(account.data.account_id, "acct-1");

    let key = client
        .create_api_key(&CreateApiKeyRequest {
            key_name: "bot".to_string(),
            ip_whitelist: None,
        })
        .await
        .unwrap();
    assert_eq!(key.data.api_key, "key");
    assert_eq!(key.data.passphrase, "phrase");
}

#[tokio::test]
async fn test_nbbo_status() {
    let router = Router::new().route(
        "/nbbo/status",
        get(|| async {
            Json(json!({
                "timestamp": "2025-01-15T10:30:00Z",
                "code": 200,
                "data": {
                    "symbol": "BTC-USDT-PERP",
                    "best_bid": 99_950.5,
                    "best_ask": 100_050.0,
                    "bid_size": 1.25,
                    "ask_size": 0.75,
                    "timestamp": "2025-01-15T10:30:00Z"
                }
            }))
        }),
    );
    let addr = serve(router).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let envelope = client.nbbo_status().await.unwrap();
    assert_eq!(envelope.data.symbol, "BTC-USDT-PERP");
    assert_eq!(envelope.data.best_bid, 99_950.5);
    assert_eq!(envelope.data.ask_size, 0.75);
}
