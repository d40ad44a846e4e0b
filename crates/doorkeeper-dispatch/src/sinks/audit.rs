use super::{ensure_success, http_client, non_empty, trim_base};
use crate::{
    consumer::Deliver,
    error::{DeliveryError, Result},
    item::{DispatchItem, ItemKind},
};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct AuditEntry<'a> {
    user_id: Option<i64>,
    message: &'a str,
}

#[derive(Serialize)]
struct AuditRequest<'a> {
    api_token: &'a str,
    log: AuditEntry<'a>,
}

#[derive(Serialize)]
struct UnknownCardRequest<'a> {
    api_token: &'a str,
    card_id: &'a str,
}

/// Audit entries and unknown card reports for the permission backend.
#[derive(Debug, Clone)]
pub struct AuditSink {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl AuditSink {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: trim_base(base_url),
            api_token: non_empty(api_token),
        })
    }
}

impl Deliver for AuditSink {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }

    async fn deliver(&self, item: &DispatchItem) -> Result<()> {
        let api_token = self
            .api_token
            .as_deref()
            .ok_or(DeliveryError::MissingCredential("API token"))?;

        let request = match item.kind {
            ItemKind::Audit => self
                .client
                .post(format!("{}/api/v1/logs", self.base_url))
                .json(&AuditRequest {
                    api_token,
                    log: AuditEntry {
                        user_id: item.id,
                        message: &item.text,
                    },
                }),
            ItemKind::UnknownCard => self
                .client
                .post(format!("{}/api/v1/unknown_cards", self.base_url))
                .json(&UnknownCardRequest {
                    api_token,
                    card_id: &item.text,
                }),
            other => return Err(DeliveryError::unsupported(format!("{other:?}"))),
        };

        let response = request.send().await?;
        ensure_success(&response)
    }
}
