//! Client Configuration
//!
//! Endpoint configuration for the GoDark trading API, the private trading
//! WebSocket, the GoMarket market-data feed, and the auxiliary services the
//! status monitors watch. Everything loads from environment variables with
//! testnet defaults.

/// Default GoDark trading REST API base URL
pub const DEFAULT_API_URL: &str = "https://godark.goquant.io/testnet";

/// Default private trading WebSocket URL
pub const DEFAULT_WS_PRIVATE_URL: &str = "wss://godark.goquant.io/ws/testnet";

/// Default GoMarket market-data WebSocket host
pub const DEFAULT_GOMARKET_WS_URL: &str = "wss://gomarket-api.goquant.io";

/// Default settlement relayer base URL
pub const DEFAULT_SETTLEMENT_RELAYER_URL: &str = "http://localhost:8080";

/// Default liquidation engine base URL
pub const DEFAULT_LIQUIDATION_ENGINE_URL: &str = "http://localhost:8081";

/// Default position management base URL (served by the liquidation engine
/// process on testnet)
pub const DEFAULT_POSITION_MANAGEMENT_URL: &str = "http://localhost:8081";

/// Default mock matching engine base URL
pub const DEFAULT_MOCK_ENGINE_URL: &str = "http://localhost:3003";

/// Default orderbook depth kept per side
pub const DEFAULT_MAX_LEVELS: usize = 10;

/// Default trade tape capacity
pub const DEFAULT_MAX_TRADES: usize = 50;

/// Client configuration
///
/// ## Environment Variables
///
/// - `GODARK_API_URL`: trading REST API base (default: testnet)
/// - `GODARK_WS_PRIVATE_URL`: private trading WebSocket URL (default: testnet)
/// - `GOMARKET_WS_URL`: GoMarket market-data WebSocket host
/// - `SETTLEMENT_RELAYER_URL`: settlement relayer base (default: localhost:8080)
/// - `LIQUIDATION_ENGINE_URL`: liquidation engine base (default: localhost:8081)
/// - `POSITION_MANAGEMENT_URL`: position management base (default: localhost:8081)
/// - `MOCK_ENGINE_URL`: mock matching engine base (default: localhost:3003)
/// - `GODARK_HANDSHAKE_TOKEN`: session token for the authenticated surfaces
/// - `GODARK_MAX_LEVELS`: orderbook depth per side (default: 10)
/// - `GODARK_MAX_TRADES`: trade tape capacity (default: 50)
#[derive(Debug, Clone)]
pub struct Config {
    /// Trading REST API base URL
    pub api_url: String,

    /// Private trading WebSocket URL (handshake token rides as a query param)
    pub ws_private_url: String,

    /// GoMarket market-data WebSocket host
    pub gomarket_ws_url: String,

    /// Settlement relayer base URL
    pub settlement_relayer_url: String,

    /// Liquidation engine base URL
    pub liquidation_engine_url: String,

    /// Position management base URL
    pub position_management_url: String,

    /// Mock matching engine base URL
    pub mock_engine_url: String,

    /// Session handshake token, if one is configured
    pub handshake_token: Option<String>,

    /// Orderbook depth kept per side
    pub max_levels: usize,

    /// Trade tape capacity
    pub max_trades: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_private_url: DEFAULT_WS_PRIVATE_URL.to_string(),
            gomarket_ws_url: DEFAULT_GOMARKET_WS_URL.to_string(),
            settlement_relayer_url: DEFAULT_SETTLEMENT_RELAYER_URL.to_string(),
            liquidation_engine_url: DEFAULT_LIQUIDATION_ENGINE_URL.to_string(),
            position_management_url: DEFAULT_POSITION_MANAGEMENT_URL.to_string(),
            mock_engine_url: DEFAULT_MOCK_ENGINE_URL.to_string(),
            handshake_token: None,
            max_levels: DEFAULT_MAX_LEVELS,
            max_trades: DEFAULT_MAX_TRADES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// testnet defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            api_url: env_or("GODARK_API_URL", DEFAULT_API_URL),
            ws_private_url: env_or("GODARK_WS_PRIVATE_URL", DEFAULT_WS_PRIVATE_URL),
            gomarket_ws_url: env_or("GOMARKET_WS_URL", DEFAULT_GOMARKET_WS_URL),
            settlement_relayer_url: env_or(
                "SETTLEMENT_RELAYER_URL",
                DEFAULT_SETTLEMENT_RELAYER_URL,
            ),
            liquidation_engine_url: env_or(
                "LIQUIDATION_ENGINE_URL",
                DEFAULT_LIQUIDATION_ENGINE_URL,
            ),
            position_management_url: env_or(
                "POSITION_MANAGEMENT_URL",
                DEFAULT_POSITION_MANAGEMENT_URL,
            ),
            mock_engine_url: env_or("MOCK_ENGINE_URL", DEFAULT_MOCK_ENGINE_URL),
            handshake_token: std::env::var("GODARK_HANDSHAKE_TOKEN")
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            max_levels: env_parse_or("GODARK_MAX_LEVELS", DEFAULT_MAX_LEVELS),
            max_trades: env_parse_or("GODARK_MAX_TRADES", DEFAULT_MAX_TRADES),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
