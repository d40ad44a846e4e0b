//! Producer front-ends used by the controller.
//!
//! Each front-end wraps one or two [`Dispatcher`]s and turns controller
//! events into [`DispatchItem`]s. None of them performs I/O.

use crate::{
    dispatcher::{Dispatcher, EnqueueResult},
    item::{Channel, DispatchItem, ItemKind},
};
use doorkeeper_core::{CardId, UserRef};
use parking_lot::Mutex;
use std::sync::Arc;

/// Gateway debug log and backend audit log.
///
/// Every line sent to the gateway is traced locally as well.
#[derive(Debug, Clone)]
pub struct EventLog {
    debug: Dispatcher<DispatchItem>,
    audit: Dispatcher<DispatchItem>,
}

impl EventLog {
    pub fn new(debug: Dispatcher<DispatchItem>, audit: Dispatcher<DispatchItem>) -> Self {
        Self { debug, audit }
    }

    /// Free-text debug line.
    pub fn log(&self, text: impl Into<String>) -> EnqueueResult {
        let item = DispatchItem::new(ItemKind::Debug, text);
        tracing::info!(target: "doorkeeper::event", "{}", item.text);
        self.debug.enqueue(item)
    }

    /// Audit entry attributed to `user`.
    pub fn audit(&self, user: UserRef, text: impl Into<String>) -> EnqueueResult {
        let item = DispatchItem::new(ItemKind::Audit, text).with_id(user.internal_id);
        tracing::info!(target: "doorkeeper::event", user_id = user.internal_id, "{}", item.text);
        self.audit.enqueue(item)
    }

    /// Report a card the permission service does not know.
    pub fn unknown_card(&self, card_id: CardId) -> EnqueueResult {
        tracing::info!(target: "doorkeeper::event", %card_id, "reporting unknown card");
        self.audit
            .enqueue(DispatchItem::new(ItemKind::UnknownCard, card_id.to_hex()))
    }

    /// Items dropped by the two log queues.
    pub fn overflows(&self) -> u64 {
        self.debug.overflows() + self.audit.overflows()
    }
}

/// Chat notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    chat: Dispatcher<DispatchItem>,
    door_name: Option<String>,
    last_status: Arc<Mutex<Option<String>>>,
}

impl Notifier {
    pub fn new(chat: Dispatcher<DispatchItem>) -> Self {
        Self {
            chat,
            door_name: None,
            last_status: Arc::new(Mutex::new(None)),
        }
    }

    /// Prefix every message with the door's name.
    pub fn door_name(mut self, name: impl Into<String>) -> Self {
        self.door_name = Some(name.into()).filter(|n: &String| !n.is_empty());
        self
    }

    /// Send `text` to the monitoring channel.
    pub fn send(&self, text: &str) -> EnqueueResult {
        self.send_to(Channel::Monitoring, text)
    }

    /// Send a status line unless it repeats the previous one.
    ///
    /// With `include_general` the line also goes to the general channel.
    pub fn set_status(&self, text: &str, include_general: bool) {
        {
            let mut last = self.last_status.lock();
            if last.as_deref() == Some(text) {
                return;
            }
            *last = Some(text.to_string());
        }
        self.send_to(Channel::Monitoring, text);
        if include_general {
            self.send_to(Channel::General, text);
        }
    }

    pub fn announce_open(&self) {
        self.set_status(":tada: The space is now open!", true);
    }

    pub fn announce_closed(&self) {
        self.set_status(":sad_panda2: The space is no longer open", true);
    }

    fn send_to(&self, channel: Channel, text: &str) -> EnqueueResult {
        let text = match &self.door_name {
            Some(door) => format!("{door}: {text}"),
            None => text.to_string(),
        };
        self.chat.enqueue(DispatchItem::new(ItemKind::Chat(channel), text))
    }
}

/// Last-access updates for the membership system.
#[derive(Debug, Clone)]
pub struct MembershipUpdater {
    updates: Dispatcher<DispatchItem>,
}

impl MembershipUpdater {
    pub fn new(updates: Dispatcher<DispatchItem>) -> Self {
        Self { updates }
    }

    /// Record that `user` was granted access now.
    pub fn record_access(&self, user: UserRef) -> EnqueueResult {
        self.updates
            .enqueue(DispatchItem::new(ItemKind::Membership, "").with_id(user.external_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{DispatchQueue, channel};

    fn drain(queue: &mut DispatchQueue<DispatchItem>) -> Vec<DispatchItem> {
        std::iter::from_fn(|| queue.try_next()).collect()
    }

    #[test]
    fn test_event_log_routes_items() {
        let (debug, mut debug_q) = channel("debug", 4);
        let (audit, mut audit_q) = channel("audit", 4);
        let log = EventLog::new(debug, audit);

        log.log("State Locked -> Open");
        log.audit(UserRef::new(42, 7), "front: Granted entry");
        log.unknown_card(CardId::new(0x13005D1DA5).unwrap());

        let debug_items = drain(&mut debug_q);
        assert_eq!(debug_items.len(), 1);
        assert_eq!(debug_items[0].kind, ItemKind::Debug);

        let audit_items = drain(&mut audit_q);
        assert_eq!(audit_items[0].kind, ItemKind::Audit);
        assert_eq!(audit_items[0].id, Some(42));
        assert_eq!(audit_items[1].kind, ItemKind::UnknownCard);
        assert_eq!(audit_items[1].text, "13005D1DA5");
    }

    #[test]
    fn test_event_log_counts_overflows() {
        let (debug, _debug_q) = channel("debug", 1);
        let (audit, _audit_q) = channel("audit", 1);
        let log = EventLog::new(debug, audit);
        for _ in 0..3 {
            log.log("x");
        }
        log.audit(UserRef::new(1, 1), "a");
        log.audit(UserRef::new(1, 1), "b");
        assert_eq!(log.overflows(), 3);
    }

    #[test]
    fn test_status_collapses_repeats() {
        let (chat, mut queue) = channel("chat", 16);
        let notifier = Notifier::new(chat);

        notifier.set_status(":lock: Door is locked", false);
        notifier.set_status(":lock: Door is locked", false);
        notifier.announce_open();
        notifier.announce_open();
        notifier.set_status(":lock: Door is locked", false);

        let kinds: Vec<ItemKind> = drain(&mut queue).into_iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ItemKind::Chat(Channel::Monitoring),
                ItemKind::Chat(Channel::Monitoring),
                ItemKind::Chat(Channel::General),
                ItemKind::Chat(Channel::Monitoring),
            ]
        );
    }

    #[test]
    fn test_plain_send_is_never_collapsed() {
        let (chat, mut queue) = channel("chat", 16);
        let notifier = Notifier::new(chat).door_name("front");
        notifier.send("hello");
        notifier.send("hello");

        let items = drain(&mut queue);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "front: hello");
    }

    #[test]
    fn test_membership_uses_external_id() {
        let (updates, mut queue) = channel("membership", 4);
        MembershipUpdater::new(updates).record_access(UserRef::new(42, 7));
        let items = drain(&mut queue);
        assert_eq!(items[0].kind, ItemKind::Membership);
        assert_eq!(items[0].id, Some(7));
    }
}
