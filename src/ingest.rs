//! Turns classified device notices into attention items.
//!
//! Noise is dropped. Everything else expires after the configured notice
//! lifetime so stale social or informational notices never resurface. When
//! the classifier fails the raw notice is queued at `medium`: an
//! unclassifiable notice is shown rather than lost.

use crate::collaborators::{ClassifiedNotice, NotificationClassifier, RawNotice};
use crate::queue::{AttentionQueue, AttentionSource, NewAttentionItem, Priority};
use chrono::{DateTime, Local};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct NotificationIngestor {
    ttl: chrono::Duration,
}

impl NotificationIngestor {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self { ttl }
    }

    /// Classify and enqueue one notice. Returns the new item id, or `None`
    /// when the notice was noise.
    pub async fn ingest(
        &self,
        classifier: &dyn NotificationClassifier,
        queue: &mut AttentionQueue,
        notice: &RawNotice,
        now: DateTime<Local>,
    ) -> Option<String> {
        let item = match classifier.classify(notice).await {
            Ok(classified) => self.item_for(&classified, now)?,
            Err(e) => {
                warn!(error = %e, app = %notice.app, "notification classification failed; queueing at medium");
                self.fallback_item(notice, now)
            }
        };
        Some(queue.push(item, now))
    }

    /// Classify and enqueue several notices. Returns ids of the queued items.
    ///
    /// A failed batch classification degrades every notice to `medium`.
    pub async fn ingest_batch(
        &self,
        classifier: &dyn NotificationClassifier,
        queue: &mut AttentionQueue,
        notices: &[RawNotice],
        now: DateTime<Local>,
    ) -> Vec<String> {
        let items: Vec<NewAttentionItem> = match classifier.classify_batch(notices).await {
            Ok(classified) => classified
                .iter()
                .filter_map(|c| self.item_for(c, now))
                .collect(),
            Err(e) => {
                warn!(error = %e, count = notices.len(), "batch classification failed; queueing at medium");
                notices
                    .iter()
                    .map(|notice| self.fallback_item(notice, now))
                    .collect()
            }
        };
        debug!(
            received = notices.len(),
            queued = items.len(),
            "ingested notification batch"
        );
        items.into_iter().map(|item| queue.push(item, now)).collect()
    }

    fn item_for(&self, notice: &ClassifiedNotice, now: DateTime<Local>) -> Option<NewAttentionItem> {
        let Some(priority) = notice.category.priority() else {
            debug!(app = %notice.app, "dropping noise notification");
            return None;
        };
        Some(self.build(&notice.app, &notice.title, &notice.text, priority, now))
    }

    fn fallback_item(&self, notice: &RawNotice, now: DateTime<Local>) -> NewAttentionItem {
        self.build(&notice.app, &notice.title, &notice.text, Priority::Medium, now)
    }

    fn build(
        &self,
        app: &str,
        title: &str,
        text: &str,
        priority: Priority,
        now: DateTime<Local>,
    ) -> NewAttentionItem {
        let message = if app.is_empty() {
            title.to_owned()
        } else {
            format!("{app}: {title}")
        };
        let mut item = NewAttentionItem::new(AttentionSource::Notification, priority, message)
            .with_data("app", app);
        if !text.is_empty() {
            item = item.with_detail(text);
        }
        match now.checked_add_signed(self.ttl) {
            Some(expires_at) => item.with_expiry(expires_at),
            None => item,
        }
    }
}
