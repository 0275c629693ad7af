//! Priority-ordered store of attention items.
//!
//! The queue is the only place items are mutated: `push`, `escalate_stale`,
//! `mark_delivered` and `gc`. Everything else reads cloned snapshots.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Where an attention item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionSource {
    Calendar,
    Notification,
    Battery,
    Relationship,
    Pattern,
    Clipboard,
    Weather,
    Briefing,
    Focus,
    System,
}

impl AttentionSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Notification => "notification",
            Self::Battery => "battery",
            Self::Relationship => "relationship",
            Self::Pattern => "pattern",
            Self::Clipboard => "clipboard",
            Self::Weather => "weather",
            Self::Briefing => "briefing",
            Self::Focus => "focus",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for AttentionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item priority. Ordering puts `Urgent` first: `Urgent < High < Medium < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Priority {
    /// The next step towards urgent reachable through staleness.
    ///
    /// `High` is the ceiling: urgent is only ever assigned by the item's
    /// producer, never reached by waiting.
    #[must_use]
    pub fn escalated(self) -> Option<Priority> {
        match self {
            Self::Low => Some(Self::Medium),
            Self::Medium => Some(Self::High),
            Self::High | Self::Urgent => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output channel an item was delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Spoken aloud.
    Tts,
    /// Quiet push notification.
    Nudge,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tts => f.write_str("tts"),
            Self::Nudge => f.write_str("nudge"),
        }
    }
}

/// An item as submitted by a producer, before the queue assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttentionItem {
    pub source: AttentionSource,
    pub priority: Priority,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Local>>,
    /// Key used by [`AttentionQueue::has_key`] to suppress repeats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl NewAttentionItem {
    pub fn new(source: AttentionSource, priority: Priority, message: impl Into<String>) -> Self {
        Self {
            source,
            priority,
            message: message.into(),
            detail: None,
            expires_at: None,
            dedupe_key: None,
            data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Local>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A pending or delivered notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionItem {
    pub id: String,
    pub source: AttentionSource,
    pub priority: Priority,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub created_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Local>>,
    pub delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<DeliveryMode>,
    pub escalation_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl AttentionItem {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    #[must_use]
    pub fn is_pending(&self, now: DateTime<Local>) -> bool {
        !self.delivered && !self.is_expired(now)
    }
}

/// Mapping from item id to item. Insertion order carries no meaning;
/// [`AttentionQueue::pending`] defines the delivery order.
#[derive(Debug, Clone, Default)]
pub struct AttentionQueue {
    items: HashMap<String, AttentionItem>,
}

impl AttentionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new undelivered item and return its generated id.
    pub fn push(&mut self, item: NewAttentionItem, now: DateTime<Local>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let stored = AttentionItem {
            id: id.clone(),
            source: item.source,
            priority: item.priority,
            message: item.message,
            detail: item.detail,
            created_at: now,
            expires_at: item.expires_at,
            delivered: false,
            delivered_at: None,
            delivery_mode: None,
            escalation_count: 0,
            dedupe_key: item.dedupe_key,
            data: item.data,
        };
        self.items.insert(id.clone(), stored);
        id
    }

    /// Undelivered, unexpired items ordered by priority, oldest first within a priority.
    #[must_use]
    pub fn pending(&self, now: DateTime<Local>) -> Vec<AttentionItem> {
        let mut pending: Vec<AttentionItem> = self
            .items
            .values()
            .filter(|item| item.is_pending(now))
            .cloned()
            .collect();
        // Id breaks exact timestamp ties so the order never depends on hash iteration.
        pending.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        pending
    }

    #[must_use]
    pub fn pending_count(&self, now: DateTime<Local>) -> usize {
        self.items.values().filter(|item| item.is_pending(now)).count()
    }

    /// Promote stale items one step. Returns how many items moved.
    ///
    /// An item escalates when it has waited longer than
    /// `threshold * (escalation_count + 1)`, so each further step needs a
    /// proportionally longer wait.
    pub fn escalate_stale(&mut self, now: DateTime<Local>, threshold: chrono::Duration) -> usize {
        let threshold_ms = threshold.num_milliseconds().max(0);
        let mut escalated = 0;
        for item in self.items.values_mut() {
            if !item.is_pending(now) {
                continue;
            }
            let Some(next) = item.priority.escalated() else {
                continue;
            };
            let waited_ms = (now - item.created_at).num_milliseconds();
            let required_ms = threshold_ms.saturating_mul(i64::from(item.escalation_count) + 1);
            if waited_ms > required_ms {
                tracing::debug!(
                    id = %item.id,
                    from = %item.priority,
                    to = %next,
                    "escalating stale attention item"
                );
                item.priority = next;
                item.escalation_count += 1;
                escalated += 1;
            }
        }
        escalated
    }

    /// Mark items delivered. Already-delivered and unknown ids are skipped.
    /// Returns how many items changed.
    pub fn mark_delivered(&mut self, ids: &[String], mode: DeliveryMode, now: DateTime<Local>) -> usize {
        let mut marked = 0;
        for id in ids {
            if let Some(item) = self.items.get_mut(id) {
                if item.delivered {
                    continue;
                }
                item.delivered = true;
                item.delivered_at = Some(now);
                item.delivery_mode = Some(mode);
                marked += 1;
            }
        }
        marked
    }

    /// Drop delivered items older than `max_age` since delivery and every
    /// item whose expiry has passed. Returns how many were removed.
    pub fn gc(&mut self, now: DateTime<Local>, max_age: chrono::Duration) -> usize {
        let before = self.items.len();
        self.items.retain(|_, item| {
            if item.is_expired(now) {
                return false;
            }
            match item.delivered_at {
                Some(at) if item.delivered => now - at <= max_age,
                _ => true,
            }
        });
        before - self.items.len()
    }

    /// Whether any item still held by the queue has a dedupe key starting with `prefix`.
    #[must_use]
    pub fn has_recent(&self, prefix: &str) -> bool {
        self.items.values().any(|item| {
            item.dedupe_key
                .as_deref()
                .is_some_and(|key| key.starts_with(prefix))
        })
    }

    /// Whether any item still held by the queue carries exactly `key`.
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.items
            .values()
            .any(|item| item.dedupe_key.as_deref() == Some(key))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AttentionItem> {
        self.items.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
