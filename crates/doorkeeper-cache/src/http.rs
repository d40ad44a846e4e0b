//! HTTP client for the permission service.
//!
//! # Endpoints
//!
//! ```text
//! POST {base}/api/v1/permissions   {"api_token": "...", "card_id": "13005D1DA5"}
//!      200 {"allowed": true, "id": 42, "int_id": 7}
//!      404 unknown card
//!
//! GET  {base}/api/v2/permissions/  Authorization: Token <api_token>
//!      200 [{"card_id": "13005D1DA5", "id": 42, "int_id": 7}, ...]
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use doorkeeper_cache::{HttpPermissionSource, HttpSourceConfig, PermissionSource};
//! use doorkeeper_core::CardId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpSourceConfig::new("https://panopticon.example.org").api_token("secret");
//! let source = HttpPermissionSource::new(config)?;
//!
//! let outcome = source.lookup(CardId::from_hex("13005D1DA5")?).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use crate::{
    error::{CacheError, Result},
    source::{LookupOutcome, PermissionRecord, PermissionSource},
};
use doorkeeper_core::{CardId, UserRef, constants::DEFAULT_HTTP_TIMEOUT_SECS};
use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the permission service client
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Base URL of the service, without trailing slash
    pub base_url: String,

    /// API token; without it every request fails with `MissingToken`
    pub api_token: Option<String>,

    /// Timeout for a complete request
    pub timeout: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl HttpSourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Set the API token
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    api_token: &'a str,
    card_id: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    allowed: bool,
    id: Option<i64>,
    int_id: Option<i64>,
}

#[derive(Deserialize)]
struct PermissionItem {
    card_id: String,
    id: i64,
    int_id: i64,
}

/// Permission service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPermissionSource {
    client: reqwest::Client,
    config: HttpSourceConfig,
}

impl HttpPermissionSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CacheError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn token(&self) -> Result<&str> {
        self.config
            .api_token
            .as_deref()
            .ok_or(CacheError::MissingToken)
    }
}

impl PermissionSource for HttpPermissionSource {
    fn is_configured(&self) -> bool {
        self.config.api_token.is_some()
    }

    async fn lookup(&self, card_id: CardId) -> Result<LookupOutcome> {
        let url = format!("{}/api/v1/permissions", self.config.base_url);
        let request = LookupRequest {
            api_token: self.token()?,
            card_id: card_id.to_hex(),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%card_id, "permission service does not know card");
            return Ok(LookupOutcome::Unknown);
        }
        if status != StatusCode::OK {
            return Err(CacheError::Status(status.as_u16()));
        }

        let body: LookupResponse = response.json().await?;
        if !body.allowed {
            return Ok(LookupOutcome::Forbidden);
        }
        match (body.id, body.int_id) {
            (Some(id), Some(int_id)) => Ok(LookupOutcome::Allowed(UserRef::new(id, int_id))),
            _ => Err(CacheError::malformed("allowed card without user ids")),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<PermissionRecord>> {
        let url = format!("{}/api/v2/permissions/", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Token {}", self.token()?))
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(CacheError::Status(status.as_u16()));
        }

        let items: Vec<serde_json::Value> = response.json().await?;
        let total = items.len();
        let records: Vec<PermissionRecord> = items.into_iter().filter_map(parse_item).collect();
        if records.len() != total {
            warn!(
                skipped = total - records.len(),
                "skipped invalid permission entries"
            );
        }
        Ok(records)
    }
}

fn parse_item(value: serde_json::Value) -> Option<PermissionRecord> {
    let item: PermissionItem = match serde_json::from_value(value) {
        Ok(item) => item,
        Err(e) => {
            warn!(error = %e, "invalid permission entry");
            return None;
        }
    };
    match CardId::from_hex(&item.card_id) {
        Ok(card_id) => Some(PermissionRecord {
            card_id,
            user: UserRef::new(item.id, item.int_id),
        }),
        Err(e) => {
            warn!(card_id = %item.card_id, error = %e, "invalid card id in permission entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_config_builder() {
        let config = HttpSourceConfig::new("https://example.org/")
            .api_token("")
            .timeout(Duration::from_secs(2));
        assert_eq!(config.base_url, "https://example.org");
        assert!(config.api_token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_item() {
        let record = parse_item(json!({"card_id": "13005D1DA5", "id": 42, "int_id": 7})).unwrap();
        assert_eq!(record.card_id.as_u64(), 0x13005D1DA5);
        assert_eq!(record.user, UserRef::new(42, 7));
    }

    #[rstest]
    #[case::missing_int_id(json!({"card_id": "13005D1DA5", "id": 42}))]
    #[case::zero_card(json!({"card_id": "0000000000", "id": 42, "int_id": 7}))]
    #[case::not_hex(json!({"card_id": "xyz", "id": 42, "int_id": 7}))]
    #[case::numeric_card(json!({"card_id": 42, "id": 42, "int_id": 7}))]
    #[case::not_an_object(json!("not an object"))]
    fn test_parse_item_skips_invalid_entries(#[case] value: serde_json::Value) {
        assert!(parse_item(value).is_none());
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let source = HttpPermissionSource::new(HttpSourceConfig::new("http://127.0.0.1:9")).unwrap();
        assert!(!source.is_configured());
        let id = CardId::new(1).unwrap();
        assert_eq!(source.lookup(id).await, Err(CacheError::MissingToken));
        assert_eq!(source.fetch_all().await, Err(CacheError::MissingToken));
    }
}
