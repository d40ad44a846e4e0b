//! HTTP sinks for the four dispatchers.
//!
//! | Sink | Endpoint | Credential |
//! |------|----------|------------|
//! | [`DebugLogSink`] | `POST {gateway}/acslog` | gateway token |
//! | [`AuditSink`] | `POST {base}/api/v1/logs`, `POST {base}/api/v1/unknown_cards` | API token |
//! | [`ChatSink`] | `POST https://slack.com/api/chat.postMessage` | bearer token |
//! | [`MembershipSink`] | `PUT {members}/api/member/id/<id>/?version=1` | basic auth |

mod audit;
mod chat;
mod debug_log;
mod membership;

pub use audit::AuditSink;
pub use chat::{ChatConfig, ChatSink};
pub use debug_log::DebugLogSink;
pub use membership::MembershipSink;

use crate::error::{DeliveryError, Result};
use std::time::Duration;

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DeliveryError::Client(e.to_string()))
}

fn ensure_success(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(DeliveryError::Status(status.as_u16()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn trim_base(url: impl Into<String>) -> String {
    url.into().trim_end_matches('/').to_string()
}
