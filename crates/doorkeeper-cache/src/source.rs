//! Where permissions come from.

use crate::error::Result;
use doorkeeper_core::{CardId, UserRef};
use std::future::Future;

/// Answer of a single-card lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Allowed(UserRef),
    Forbidden,
    /// The service does not know the card.
    Unknown,
}

/// One entry of the bulk permission list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionRecord {
    pub card_id: CardId,
    pub user: UserRef,
}

/// Remote permission service.
///
/// The futures are `Send` so the refresh loop can run on its own task.
pub trait PermissionSource: Send + Sync {
    /// False when the credentials needed to talk to the service are missing.
    fn is_configured(&self) -> bool;

    /// Ask about a single card.
    fn lookup(&self, card_id: CardId) -> impl Future<Output = Result<LookupOutcome>> + Send;

    /// Fetch the permission list of every card with access.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<PermissionRecord>>> + Send;
}
