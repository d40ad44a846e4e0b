use super::{ensure_success, http_client, non_empty, trim_base};
use crate::{consumer::Deliver, error::Result, item::DispatchItem};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct LogRequest<'a> {
    token: &'a str,
    timestamp: String,
    text: &'a str,
}

/// Free-text log lines posted to the gateway.
#[derive(Debug, Clone)]
pub struct DebugLogSink {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl DebugLogSink {
    pub fn new(gateway_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: format!("{}/acslog", trim_base(gateway_url)),
            token: non_empty(token),
        })
    }
}

impl Deliver for DebugLogSink {
    fn name(&self) -> &'static str {
        "debug-log"
    }

    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn deliver(&self, item: &DispatchItem) -> Result<()> {
        let Some(token) = self.token.as_deref() else {
            return Err(crate::error::DeliveryError::MissingCredential("gateway token"));
        };
        let request = LogRequest {
            token,
            timestamp: item.stamp(),
            text: &item.text,
        };
        let response = self.client.post(&self.url).json(&request).send().await?;
        ensure_success(&response)
    }
}
