//! Local card permission cache.
//!
//! The cache answers "may this card open the door?" without network I/O
//! whenever it has a fresh entry. A background task replaces the whole map
//! with the service's permission list at a fixed interval; cards missing
//! from the map, or whose entry is stale, fall back to a single-card lookup.
//!
//! ```text
//! has_access(card)
//!   ├─ fresh entry ───────────────> Allowed
//!   └─ absent / stale ─> lookup ─┬─> Allowed (entry inserted)
//!                                ├─> Forbidden
//!                                ├─> UnknownCard (404)
//!                                └─> Error(message)
//! ```

use crate::source::{LookupOutcome, PermissionSource};
use doorkeeper_core::{
    AccessResult, CardId, UserRef,
    constants::{DEFAULT_CACHE_REFRESH_SECS, DEFAULT_CACHE_STALENESS_SECS},
};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Card cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which an entry no longer counts as a hit.
    pub staleness: Duration,

    /// Interval between bulk refreshes.
    pub refresh_interval: Duration,

    /// How long the refresh loop idles when the source has no credentials.
    pub unconfigured_retry: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(DEFAULT_CACHE_STALENESS_SECS),
            refresh_interval: Duration::from_secs(DEFAULT_CACHE_REFRESH_SECS),
            unconfigured_retry: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Set the staleness window
    pub fn staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    /// Set the bulk refresh interval
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    user: UserRef,
    refreshed: Instant,
}

/// Card permission cache backed by a [`PermissionSource`].
pub struct CardCache<S> {
    source: S,
    entries: RwLock<HashMap<CardId, Entry>>,
    config: CacheConfig,
}

impl<S: PermissionSource> CardCache<S> {
    pub fn new(source: S, config: CacheConfig) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Decide whether `card_id` grants access.
    ///
    /// Only a missing or stale entry causes network I/O.
    pub async fn has_access(&self, card_id: CardId) -> AccessResult {
        if let Some(user) = self.fresh_entry(card_id) {
            debug!(%card_id, "card cache hit");
            return AccessResult::Allowed(user);
        }

        match self.source.lookup(card_id).await {
            Ok(LookupOutcome::Allowed(user)) => {
                self.entries.write().insert(
                    card_id,
                    Entry {
                        user,
                        refreshed: Instant::now(),
                    },
                );
                AccessResult::Allowed(user)
            }
            Ok(LookupOutcome::Forbidden) => AccessResult::Forbidden,
            Ok(LookupOutcome::Unknown) => AccessResult::UnknownCard,
            Err(e) => {
                warn!(%card_id, error = %e, "permission lookup failed");
                AccessResult::Error(e.to_string())
            }
        }
    }

    fn fresh_entry(&self, card_id: CardId) -> Option<UserRef> {
        let entries = self.entries.read();
        let entry = entries.get(&card_id)?;
        if entry.refreshed.elapsed() >= self.config.staleness {
            debug!(%card_id, "card cache entry stale");
            return None;
        }
        Some(entry.user)
    }

    /// Replace the whole map with the service's permission list.
    ///
    /// On failure the current map is left untouched.
    pub async fn refresh_once(&self) -> crate::Result<usize> {
        let records = self.source.fetch_all().await?;
        let now = Instant::now();
        let map: HashMap<CardId, Entry> = records
            .into_iter()
            .map(|r| {
                (
                    r.card_id,
                    Entry {
                        user: r.user,
                        refreshed: now,
                    },
                )
            })
            .collect();
        let count = map.len();
        *self.entries.write() = map;
        info!(cards = count, "card cache updated");
        Ok(count)
    }

    /// Refresh periodically until the task is dropped.
    pub async fn run_refresh(self: Arc<Self>) {
        loop {
            if !self.source.is_configured() {
                warn!("no API token, card cache refresh idle");
                tokio::time::sleep(self.config.unconfigured_retry).await;
                continue;
            }
            if let Err(e) = self.refresh_once().await {
                warn!(error = %e, "card cache refresh failed, keeping previous entries");
            }
            tokio::time::sleep(self.config.refresh_interval).await;
        }
    }

    /// Number of cached cards, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
