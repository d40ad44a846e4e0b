//! Items carried by the outbound dispatchers.

use chrono::{DateTime, Utc};
use doorkeeper_core::constants::MAX_ITEM_TEXT;
use std::fmt;

/// Chat channel an item is addressed to.
///
/// The chat sink maps these to real channel names, taking test mode into
/// account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Monitoring,
    General,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Monitoring => write!(f, "monitoring"),
            Self::General => write!(f, "general"),
        }
    }
}

/// What an item is and, implicitly, where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Free text for the gateway debug log.
    Debug,
    /// Backend audit entry keyed by the internal user id.
    Audit,
    /// Card the permission service does not know; the text is the card id.
    UnknownCard,
    /// Chat message.
    Chat(Channel),
    /// Last-access update keyed by the external user id.
    Membership,
}

/// One unit of outbound work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchItem {
    pub kind: ItemKind,
    pub text: String,
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl DispatchItem {
    /// Create an item stamped with the current time.
    ///
    /// Text longer than the item limit is cut at a character boundary.
    pub fn new(kind: ItemKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: truncate(text.into(), MAX_ITEM_TEXT),
            id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Timestamp in the `YYYY-MM-DD HH:MM:SS` UTC form the services expect.
    pub fn stamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn truncate(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_long_text_truncated() {
        let item = DispatchItem::new(ItemKind::Debug, "x".repeat(1000));
        assert_eq!(item.text.len(), MAX_ITEM_TEXT);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let text = format!("{}æ", "x".repeat(MAX_ITEM_TEXT - 1));
        let item = DispatchItem::new(ItemKind::Debug, text);
        assert_eq!(item.text.len(), MAX_ITEM_TEXT - 1);
    }

    #[test]
    fn test_short_text_untouched() {
        let item = DispatchItem::new(ItemKind::Chat(Channel::General), "hello").with_id(7);
        assert_eq!(item.text, "hello");
        assert_eq!(item.id, Some(7));
    }

    #[test]
    fn test_stamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 18, 5, 9).unwrap();
        let item = DispatchItem::new(ItemKind::Membership, "").with_timestamp(ts);
        assert_eq!(item.stamp(), "2024-03-07 18:05:09");
    }
}
