//! Polling status monitors
//!
//! A monitor owns a background task that polls one service on a fixed
//! interval and publishes the latest verdict over a watch channel. The
//! first poll fires immediately; callers read `status()` at any time or
//! subscribe for changes.

pub mod services;

pub use services::{
    ControlStatus, LiquidationStats, MatchingStats, RelayerStats, ServiceClient, ServiceKind,
    ServiceProbe, ServiceStats, SettlementBatchStatus, StartResponse, StopResponse,
};

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Latest known state of one service.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub running: bool,
    /// True until the first poll completes
    pub loading: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub stats: Option<ServiceStats>,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            running: false,
            loading: true,
            last_updated: None,
            stats: None,
        }
    }
}

/// Background poller for one service.
pub struct StatusMonitor {
    kind: ServiceKind,
    rx: watch::Receiver<ServiceStatus>,
    task: JoinHandle<()>,
}

impl StatusMonitor {
    /// Start polling on the service's default interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(client: ServiceClient) -> Self {
        let period = client.kind().poll_interval();
        Self::with_interval(client, period)
    }

    /// Start polling on a custom interval.
    pub fn with_interval(client: ServiceClient, period: Duration) -> Self {
        let kind = client.kind();
        let (tx, rx) = watch::channel(ServiceStatus::default());
        let task = tokio::spawn(run_poll(client, period, tx));
        Self { kind, rx, task }
    }

    /// Latest verdict. `loading` stays true until the first poll lands.
    pub fn status(&self) -> ServiceStatus {
        self.rx.borrow().clone()
    }

    /// Watch for verdict changes.
    pub fn subscribe(&self) -> watch::Receiver<ServiceStatus> {
        self.rx.clone()
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Stop polling. The last published status stays readable.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_poll(client: ServiceClient, period: Duration, tx: watch::Sender<ServiceStatus>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let probe = client.poll().await;
        let status = ServiceStatus {
            running: probe.running,
            loading: false,
            last_updated: Some(Utc::now()),
            stats: probe.stats,
        };
        if tx.send(status).is_err() {
            debug!(service = %client.kind(), "Status receiver dropped, stopping monitor");
            break;
        }
    }
}
