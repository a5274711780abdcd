//! Backend service probes
//!
//! Each supporting service (settlement relayer, liquidation engine, position
//! management, mock matching engine) exposes some mix of a control route, a
//! health route, and a stats route. A probe walks them in that order and
//! absorbs every failure into a down/degraded verdict; polling never
//! propagates an error to the caller.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

const STATS_TIMEOUT: Duration = Duration::from_secs(3);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
/// Starting a service waits for readiness, which can take a while.
const START_TIMEOUT: Duration = Duration::from_secs(30);

/// The supporting services a deployment runs next to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    SettlementRelayer,
    LiquidationEngine,
    PositionManagement,
    MockEngine,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::SettlementRelayer => "settlement-relayer",
            ServiceKind::LiquidationEngine => "liquidation-engine",
            ServiceKind::PositionManagement => "position-management",
            ServiceKind::MockEngine => "mock-engine",
        }
    }

    /// How often a monitor polls this service.
    pub fn poll_interval(&self) -> Duration {
        match self {
            ServiceKind::MockEngine => Duration::from_secs(2),
            _ => Duration::from_secs(3),
        }
    }

    fn stats_path(&self) -> Option<&'static str> {
        match self {
            ServiceKind::SettlementRelayer => Some("/settlement/stats"),
            ServiceKind::LiquidationEngine => Some("/stats"),
            ServiceKind::PositionManagement => None,
            ServiceKind::MockEngine => Some("/api/stats"),
        }
    }

    fn health_path(&self) -> Option<&'static str> {
        match self {
            ServiceKind::MockEngine => None,
            _ => Some("/health"),
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Settlement relayer counters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayerStats {
    pub total_settled: u64,
    pub success_rate: f64,
    pub pending_batches: u64,
    pub failed_batches: u64,
}

/// Liquidation engine counters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LiquidationStats {
    pub total_liquidations: u64,
    pub success_rate: f64,
    pub pending_liquidations: u64,
    /// Lamport balance, kept as the string the engine reports
    pub insurance_fund_balance: String,
    pub liquidator_count: u32,
}

/// Mock matching engine counters. This service reports camelCase fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchingStats {
    pub orders_received: u64,
    pub orders_matched: u64,
    pub orders_failed: u64,
    pub trades_sent_to_relayer: u64,
    pub trades_relayer_success: u64,
    pub trades_relayer_failed: u64,
    pub total_volume: f64,
    pub average_fill_price: f64,
    pub uptime: u64,
    pub match_rate: f64,
    pub relayer_success_rate: f64,
    pub start_time: i64,
    pub last_order_time: Option<i64>,
}

/// Stats payload, shaped per service.
#[derive(Debug, Clone)]
pub enum ServiceStats {
    Relayer(RelayerStats),
    Liquidation(LiquidationStats),
    Matching(MatchingStats),
}

/// Control route answer for one managed service process.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControlStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: u16,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StartResponse {
    pub success: bool,
    pub pid: Option<u32>,
    pub ready: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StopResponse {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// One settlement batch as the relayer reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementBatchStatus {
    pub batch_id: String,
    pub status: String,
    pub tx_signature: Option<String>,
    pub trade_count: u32,
    pub created_at: i64,
}

/// Outcome of a single poll.
#[derive(Debug, Clone)]
pub struct ServiceProbe {
    pub running: bool,
    pub stats: Option<ServiceStats>,
}

/// Probe client for one service.
#[derive(Clone)]
pub struct ServiceClient {
    kind: ServiceKind,
    http: Client,
    base_url: String,
    control_url: Option<String>,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("kind", &self.kind.name())
            .field("base_url", &self.base_url)
            .field("control_url", &self.control_url)
            .finish()
    }
}

impl ServiceClient {
    /// Creates a probe client without a control route. The control gate is
    /// skipped and a silent service reads as down.
    pub fn new(kind: ServiceKind, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("godark-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            kind,
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            control_url: None,
        }
    }

    /// Creates a probe client with a control route that manages the service
    /// process (GET status, POST start, DELETE stop).
    pub fn with_control(
        kind: ServiceKind,
        base_url: impl Into<String>,
        control_url: impl Into<String>,
    ) -> Self {
        let mut client = Self::new(kind, base_url);
        client.control_url = Some(control_url.into());
        client
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Walk the service's routes and report whether it is up, with stats
    /// when they can be had.
    ///
    /// Order: control gate first (a stopped process short-circuits), then
    /// stats, then health, then whatever the control route said. Every
    /// failure is absorbed; this never returns an error.
    pub async fn poll(&self) -> ServiceProbe {
        let mut fallback_running = false;

        if let Some(control_url) = &self.control_url {
            let Some(control) = self.control_probe(control_url).await else {
                return ServiceProbe {
                    running: false,
                    stats: None,
                };
            };
            if !control.running {
                return ServiceProbe {
                    running: false,
                    stats: None,
                };
            }
            fallback_running = true;
        }

        if let Some(path) = self.kind.stats_path() {
            if let Some(stats) = self.stats_probe(path).await {
                return ServiceProbe {
                    running: true,
                    stats: Some(stats),
                };
            }
        }

        if let Some(path) = self.kind.health_path() {
            if let Some(ok) = self.health_probe(path).await {
                return ServiceProbe {
                    running: ok,
                    stats: None,
                };
            }
        }

        ServiceProbe {
            running: fallback_running,
            stats: None,
        }
    }

    async fn control_probe(&self, control_url: &str) -> Option<ControlStatus> {
        let response = match self.http.get(control_url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(service = %self.kind, error = %e, "Control route unreachable");
                return None;
            }
        };
        if !response.status().is_success() {
            return None;
        }
        response.json::<ControlStatus>().await.ok()
    }

    async fn stats_probe(&self, path: &str) -> Option<ServiceStats> {
        let url = format!("{}{}", self.base_url, path);
        let response = match self.http.get(&url).timeout(STATS_TIMEOUT).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(service = %self.kind, error = %e, "Stats route unreachable");
                return None;
            }
        };
        if !response.status().is_success() {
            return None;
        }

        match self.kind {
            ServiceKind::SettlementRelayer => response
                .json::<RelayerStats>()
                .await
                .ok()
                .map(ServiceStats::Relayer),
            ServiceKind::LiquidationEngine => response
                .json::<LiquidationStats>()
                .await
                .ok()
                .map(ServiceStats::Liquidation),
            ServiceKind::MockEngine => response
                .json::<MatchingStats>()
                .await
                .ok()
                .map(ServiceStats::Matching),
            ServiceKind::PositionManagement => None,
        }
    }

    /// Some(up) when the health route answered at all, None when it could
    /// not be reached.
    async fn health_probe(&self, path: &str) -> Option<bool> {
        let url = format!("{}{}", self.base_url, path);
        match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => Some(response.status().is_success()),
            Err(e) => {
                debug!(service = %self.kind, error = %e, "Health route unreachable");
                None
            }
        }
    }

    /// One-shot health check.
    pub async fn health(&self) -> bool {
        match self.kind.health_path() {
            Some(path) => self.health_probe(path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Ask the control route for the managed process state.
    pub async fn control_status(&self) -> ApiResult<ControlStatus> {
        let control_url = self.require_control()?;
        let response = self.http.get(control_url).send().await?;
        Self::decode_control(response).await
    }

    /// Start the managed service process and wait for readiness.
    pub async fn start_service(&self) -> ApiResult<StartResponse> {
        let control_url = self.require_control()?;
        let response = self
            .http
            .post(control_url)
            .timeout(START_TIMEOUT)
            .send()
            .await?;
        Self::decode_control(response).await
    }

    /// Stop the managed service process.
    pub async fn stop_service(&self) -> ApiResult<StopResponse> {
        let control_url = self.require_control()?;
        let response = self.http.delete(control_url).send().await?;
        Self::decode_control(response).await
    }

    fn require_control(&self) -> ApiResult<&str> {
        self.control_url.as_deref().ok_or_else(|| {
            ApiError::Connection(format!("no control route configured for {}", self.kind))
        })
    }

    async fn decode_control<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ApiResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(control_error(status, &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Look up one settlement batch. Settlement relayer only.
    ///
    /// An unknown batch id and any lookup failure both read as None.
    pub async fn batch_status(&self, batch_id: &str) -> Option<SettlementBatchStatus> {
        let url = format!("{}/settlement/status/{}", self.base_url, batch_id);
        match self.http.get(&url).timeout(STATS_TIMEOUT).send().await {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => None,
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            Ok(response) => {
                warn!(batch_id = %batch_id, status = %response.status(), "Batch status lookup failed");
                None
            }
            Err(e) => {
                warn!(batch_id = %batch_id, error = %e, "Batch status lookup failed");
                None
            }
        }
    }

    /// Find the batch a trade settled in. Settlement relayer only.
    pub async fn batch_by_trade(&self, trade_id: &str) -> Option<String> {
        #[derive(Deserialize)]
        struct BatchRef {
            batch_id: String,
        }

        let url = format!("{}/settlement/batch-by-trade/{}", self.base_url, trade_id);
        match self.http.get(&url).timeout(STATS_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<BatchRef>()
                .await
                .ok()
                .map(|parsed| parsed.batch_id),
            Ok(_) => None,
            Err(e) => {
                warn!(trade_id = %trade_id, error = %e, "Batch lookup failed");
                None
            }
        }
    }

    /// Batches not yet confirmed on chain. Settlement relayer only.
    pub async fn pending_batches(&self) -> Vec<SettlementBatchStatus> {
        let url = format!("{}/settlement/batches/pending", self.base_url);
        match self.http.get(&url).timeout(STATS_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => {
                response.json().await.unwrap_or_default()
            }
            Ok(response) => {
                warn!(status = %response.status(), "Pending batch listing failed");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Pending batch listing failed");
                Vec::new()
            }
        }
    }
}

fn control_error(status: StatusCode, body: &str) -> ApiError {
    #[derive(Deserialize, Default)]
    struct ErrBody {
        error: Option<String>,
        message: Option<String>,
    }

    let parsed: ErrBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.error.or(parsed.message).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    ApiError::Service {
        code: i64::from(status.as_u16()),
        message,
        timestamp: None,
    }
}
