use super::{ensure_success, http_client, non_empty};
use crate::{
    consumer::Deliver,
    error::{DeliveryError, Result},
    item::{Channel, DispatchItem, ItemKind},
};
use doorkeeper_core::constants::DEFAULT_HTTP_TIMEOUT_SECS;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat sink configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Full URL of the `chat.postMessage` endpoint.
    pub api_url: String,

    /// Bot token; without it every message is discarded.
    pub token: Option<String>,

    pub monitoring_channel: String,
    pub general_channel: String,

    /// Channel that replaces the monitoring channel in test mode.
    pub testing_channel: String,

    /// In test mode nothing is posted to the general channel.
    pub test_mode: bool,

    pub icon_emoji: String,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: "https://slack.com/api/chat.postMessage".to_string(),
            token: None,
            monitoring_channel: "private-monitoring".to_string(),
            general_channel: "general".to_string(),
            testing_channel: "testing".to_string(),
            test_mode: false,
            icon_emoji: ":panopticon:".to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl ChatConfig {
    /// Set the bot token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = non_empty(Some(token.into()));
        self
    }

    /// Set the endpoint URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Enable or disable test mode
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Real channel name for `channel`, or `None` if it is muted.
    pub fn resolve(&self, channel: Channel) -> Option<&str> {
        match (channel, self.test_mode) {
            (Channel::Monitoring, false) => Some(&self.monitoring_channel),
            (Channel::Monitoring, true) => Some(&self.testing_channel),
            (Channel::General, false) => Some(&self.general_channel),
            (Channel::General, true) => None,
        }
    }
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    icon_emoji: &'a str,
    parse: &'static str,
}

#[derive(Deserialize)]
struct PostReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Chat messages posted through the Slack web API.
#[derive(Debug, Clone)]
pub struct ChatSink {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatSink {
    pub fn new(config: ChatConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout)?,
            config,
        })
    }
}

impl Deliver for ChatSink {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn is_configured(&self) -> bool {
        self.config.token.is_some()
    }

    async fn deliver(&self, item: &DispatchItem) -> Result<()> {
        let ItemKind::Chat(channel) = item.kind else {
            return Err(DeliveryError::unsupported(format!("{:?}", item.kind)));
        };
        let Some(channel) = self.config.resolve(channel) else {
            tracing::debug!(text = %item.text, "general channel muted in test mode");
            return Ok(());
        };
        let token = self
            .config
            .token
            .as_deref()
            .ok_or(DeliveryError::MissingCredential("chat token"))?;

        let response = self
            .client
            .post(&self.config.api_url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&PostMessage {
                channel,
                text: &item.text,
                icon_emoji: &self.config.icon_emoji,
                parse: "full",
            })
            .send()
            .await?;
        ensure_success(&response)?;

        let reply: PostReply = response
            .json()
            .await
            .map_err(|e| DeliveryError::rejected(format!("unreadable reply: {e}")))?;
        if reply.ok {
            Ok(())
        } else {
            Err(DeliveryError::rejected(
                reply.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}
