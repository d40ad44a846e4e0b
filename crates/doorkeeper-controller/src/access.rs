//! Access decisions as seen by the controller.

#![allow(async_fn_in_trait)]

use doorkeeper_cache::{CardCache, PermissionSource};
use doorkeeper_core::{AccessResult, CardId};
use std::sync::Arc;

/// Anything that can decide whether a card opens the door.
pub trait AccessCheck {
    async fn has_access(&self, card_id: CardId) -> AccessResult;
}

impl<S: PermissionSource> AccessCheck for CardCache<S> {
    async fn has_access(&self, card_id: CardId) -> AccessResult {
        CardCache::has_access(self, card_id).await
    }
}

impl<T: AccessCheck> AccessCheck for Arc<T> {
    async fn has_access(&self, card_id: CardId) -> AccessResult {
        T::has_access(self, card_id).await
    }
}
