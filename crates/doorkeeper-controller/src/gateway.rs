//! Link to the remote gateway.
//!
//! The controller and the network are decoupled by [`GatewayLink`]: the
//! controller publishes its status and reads pending actions without I/O,
//! while [`run_sync`] exchanges both with the gateway on its own task.
//!
//! ```text
//! controller ──set_status──> GatewayLink ──POST /acsstatus──> gateway
//! controller <─take_action── GatewayLink <──POST /acsquery─── gateway
//! ```
//!
//! Too many consecutive failures end [`run_sync`] with an error so the
//! process can exit and be restarted by its supervisor.

use crate::error::GatewayError;
use doorkeeper_core::{RemoteCommand, constants::DEFAULT_HTTP_TIMEOUT_SECS};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, GatewayError>;

/// Status document pushed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    /// `open` or `closed`, from the door sensor.
    pub door: &'static str,

    /// `open` while the space is announced open.
    pub space: &'static str,

    /// Wire word of the lock state.
    #[serde(rename = "lock status")]
    pub lock_status: &'static str,

    /// Items dropped by the log dispatchers, omitted while zero.
    #[serde(skip_serializing_if = "is_zero")]
    pub log_overflows: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Default)]
struct LinkState {
    status: Option<GatewayStatus>,
    action: Option<RemoteCommand>,
    allow_open: bool,
}

/// State shared between the controller and the sync task.
#[derive(Debug, Clone, Default)]
pub struct GatewayLink {
    state: Arc<Mutex<LinkState>>,
}

impl GatewayLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the controller status for the next push.
    pub fn set_status(&self, status: GatewayStatus) {
        self.state.lock().status = Some(status);
    }

    /// Last published status.
    pub fn status(&self) -> Option<GatewayStatus> {
        self.state.lock().status.clone()
    }

    /// Take the pending remote action, leaving none.
    pub fn take_action(&self) -> Option<RemoteCommand> {
        self.state.lock().action.take()
    }

    /// True while the gateway grants an open day regardless of the weekday.
    pub fn allow_open(&self) -> bool {
        self.state.lock().allow_open
    }

    /// Store the result of a query. A reply without action keeps an unread one.
    pub fn record_query(&self, action: Option<RemoteCommand>, allow_open: bool) {
        let mut state = self.state.lock();
        if let Some(action) = action
            && let Some(unread) = state.action.replace(action)
        {
            debug!(action = %unread, "unread remote action replaced");
        }
        state.allow_open = allow_open;
    }
}

/// Gateway client configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway, without trailing slash.
    pub base_url: String,

    pub token: String,

    /// Interval between two sync rounds.
    pub sync_interval: Duration,

    /// Consecutive failed rounds after which the sync task gives up.
    pub max_failures: u32,

    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            sync_interval: Duration::from_secs(10),
            max_failures: 10,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Set the sync interval
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Set the failure limit
    pub fn max_failures(mut self, count: u32) -> Self {
        self.max_failures = count.max(1);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    token: &'a str,
    status: &'a GatewayStatus,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    token: &'a str,
}

/// Reply of the action query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryReply {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub allow_open: Option<bool>,
}

/// HTTP client for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Push `status` to the gateway.
    pub async fn post_status(&self, status: &GatewayStatus) -> Result<()> {
        let url = format!("{}/acsstatus", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&StatusRequest {
                token: &self.config.token,
                status,
            })
            .send()
            .await?;
        check_status(&response)
    }

    /// Ask the gateway for a pending action.
    pub async fn query(&self) -> Result<QueryReply> {
        let url = format!("{}/acsquery", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&QueryRequest {
                token: &self.config.token,
            })
            .send()
            .await?;
        check_status(&response)?;
        Ok(response.json().await?)
    }

    /// One round: push the latest status, then fetch the pending action.
    pub async fn sync_once(&self, link: &GatewayLink) -> Result<()> {
        if let Some(status) = link.status() {
            self.post_status(&status).await?;
        }
        let reply = self.query().await?;
        let action = reply.action.as_deref().and_then(RemoteCommand::parse);
        if let Some(action) = &action {
            info!(%action, "gateway requested action");
        }
        link.record_query(action, reply.allow_open.unwrap_or(false));
        Ok(())
    }
}

fn check_status(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(GatewayError::Status(status.as_u16()))
    }
}

/// Sync with the gateway until it fails `max_failures` times in a row.
pub async fn run_sync(link: GatewayLink, client: GatewayClient) -> Result<()> {
    let mut interval = tokio::time::interval(client.config.sync_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        interval.tick().await;
        match client.sync_once(&link).await {
            Ok(()) => {
                if failures > 0 {
                    info!(failures, "gateway reachable again");
                }
                failures = 0;
            }
            Err(e) => {
                failures += 1;
                warn!(failures, error = %e, "gateway sync failed");
                if failures >= client.config.max_failures {
                    return Err(GatewayError::TooManyFailures {
                        count: failures,
                        last: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serialization() {
        let mut status = GatewayStatus {
            door: "closed",
            space: "open",
            lock_status: "unlocked",
            log_overflows: 0,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"door": "closed", "space": "open", "lock status": "unlocked"})
        );

        status.log_overflows = 3;
        assert_eq!(serde_json::to_value(&status).unwrap()["log_overflows"], 3);
    }

    #[test]
    fn test_action_is_taken_once() {
        let link = GatewayLink::new();
        link.record_query(Some(RemoteCommand::Unlock), true);
        link.record_query(None, true);

        assert!(link.allow_open());
        assert_eq!(link.take_action(), Some(RemoteCommand::Unlock));
        assert_eq!(link.take_action(), None);

        link.record_query(None, false);
        assert!(!link.allow_open());
    }

    #[test]
    fn test_query_reply_defaults() {
        let reply: QueryReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply, QueryReply::default());
    }
}
