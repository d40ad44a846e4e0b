use super::{ensure_success, http_client, non_empty, trim_base};
use crate::{
    consumer::Deliver,
    error::{DeliveryError, Result},
    item::DispatchItem,
};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct MemberFields {
    field1: String,
}

#[derive(Serialize)]
struct MemberUpdate {
    members: MemberFields,
}

/// Last-access timestamps written to the membership system.
#[derive(Debug, Clone)]
pub struct MembershipSink {
    client: reqwest::Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
}

impl MembershipSink {
    pub fn new(
        base_url: impl Into<String>,
        user: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: trim_base(base_url),
            user: non_empty(user),
            password: non_empty(password),
        })
    }

    fn url(&self, member_id: i64) -> String {
        format!("{}/api/member/id/{member_id}/?version=1", self.base_url)
    }
}

impl Deliver for MembershipSink {
    fn name(&self) -> &'static str {
        "membership"
    }

    fn is_configured(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }

    async fn deliver(&self, item: &DispatchItem) -> Result<()> {
        let (Some(user), Some(password)) = (&self.user, &self.password) else {
            return Err(DeliveryError::MissingCredential("membership user/password"));
        };
        let Some(member_id) = item.id else {
            return Err(DeliveryError::unsupported("membership update without member id"));
        };

        let body = MemberUpdate {
            members: MemberFields {
                field1: item.stamp(),
            },
        };
        let response = self
            .client
            .put(self.url(member_id))
            .basic_auth(user, Some(password))
            .json(&body)
            .send()
            .await?;
        ensure_success(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_and_credentials() {
        let sink = MembershipSink::new(
            "https://members.example.org/",
            Some("door".into()),
            Some(String::new()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            sink.url(7),
            "https://members.example.org/api/member/id/7/?version=1"
        );
        assert!(!sink.is_configured());
    }
}
