//! Delivery policy: whether, how and what to flush from the queue.
//!
//! Decision order for a regular tick:
//!
//! 1. Nothing pending: nothing to do.
//! 2. Urgent items with breakthrough enabled: all of them are spoken,
//!    whatever the attention state. This is the only path through `silent`.
//! 3. `silent`: items stay queued.
//! 4. `whisper`: after the batch interval, up to `whisper_batch_size`
//!    items go out as one nudge.
//! 5. `speak`: after the minimum idle time, up to `speak_batch_size`
//!    items are spoken.
//!
//! Several items are merged into a single message by [`synthesize`].

use crate::collaborators::{Collaborators, NudgeMessage};
use crate::config::CircadianConfig;
use crate::phase::AttentionState;
use crate::queue::{AttentionItem, AttentionQueue, AttentionSource, DeliveryMode, Priority};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What asked for the delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTrigger {
    /// Regular engine tick: every rule applies.
    Tick,
    /// Phase entry flush: pacing is skipped, `silent` is still respected.
    PhaseFlush,
    /// Explicit request: pacing and `silent` are both skipped.
    Manual,
}

/// A decided but not yet dispatched delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPlan {
    pub mode: DeliveryMode,
    pub items: Vec<AttentionItem>,
    /// Urgent items delivered regardless of attention state.
    pub breakthrough: bool,
}

/// A completed delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub mode: DeliveryMode,
    pub items: Vec<AttentionItem>,
    pub synthesis: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryScheduler {
    last_delivery: Option<DateTime<Local>>,
}

impl DeliveryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the most recent successful delivery of any kind.
    #[must_use]
    pub fn last_delivery(&self) -> Option<DateTime<Local>> {
        self.last_delivery
    }

    /// Decide what to deliver from `pending` (already in priority order).
    #[must_use]
    pub fn plan(
        &self,
        pending: &[AttentionItem],
        state: AttentionState,
        config: &CircadianConfig,
        trigger: DeliveryTrigger,
        now: DateTime<Local>,
    ) -> Option<DeliveryPlan> {
        if pending.is_empty() {
            return None;
        }

        if config.urgent_breakthrough && pending.iter().any(|i| i.priority == Priority::Urgent) {
            let items = pending
                .iter()
                .filter(|i| i.priority == Priority::Urgent)
                .cloned()
                .collect();
            return Some(DeliveryPlan {
                mode: DeliveryMode::Tts,
                items,
                breakthrough: true,
            });
        }

        let (mode, batch, min_gap) = match (state, trigger) {
            (AttentionState::Speak, _) => (
                DeliveryMode::Tts,
                config.speak_batch_size,
                config.speak_min_idle(),
            ),
            (AttentionState::Whisper, _) | (AttentionState::Silent, DeliveryTrigger::Manual) => (
                DeliveryMode::Nudge,
                config.whisper_batch_size,
                config.batch_delivery_interval(),
            ),
            (AttentionState::Silent, _) => return None,
        };

        if trigger == DeliveryTrigger::Tick && !self.paced(min_gap, now) {
            return None;
        }

        Some(DeliveryPlan {
            mode,
            items: pending.iter().take(batch).cloned().collect(),
            breakthrough: false,
        })
    }

    /// Plan and dispatch one delivery. Items are marked delivered only
    /// when the output channel accepted the message.
    pub async fn deliver(
        &mut self,
        queue: &mut AttentionQueue,
        collaborators: &Collaborators,
        state: AttentionState,
        config: &CircadianConfig,
        trigger: DeliveryTrigger,
        now: DateTime<Local>,
    ) -> Option<DeliveryOutcome> {
        let pending = queue.pending(now);
        let Some(plan) = self.plan(&pending, state, config, trigger, now) else {
            debug!(
                pending = pending.len(),
                state = %state,
                ?trigger,
                "no delivery this round"
            );
            return None;
        };

        let synthesis = synthesize(&plan.items);
        let sent = match plan.mode {
            DeliveryMode::Tts => {
                if plan.breakthrough {
                    if let Err(e) = collaborators.haptic.attention().await {
                        warn!(error = %e, "haptic attention cue failed");
                    }
                }
                collaborators.tts.speak(&synthesis).await
            }
            DeliveryMode::Nudge => {
                if let Err(e) = collaborators.haptic.tap().await {
                    warn!(error = %e, "haptic tap failed");
                }
                let nudge = NudgeMessage {
                    title: nudge_title(&plan.items),
                    message: synthesis.clone(),
                    priority: plan.items.first().map_or(Priority::Medium, |i| i.priority),
                    expires_in_secs: config.nudge_expiry_secs,
                };
                collaborators.nudge.push(nudge).await
            }
        };
        if let Err(e) = sent {
            warn!(error = %e, mode = %plan.mode, "delivery channel failed; items stay queued");
            return None;
        }

        let ids: Vec<String> = plan.items.iter().map(|i| i.id.clone()).collect();
        queue.mark_delivered(&ids, plan.mode, now);
        self.last_delivery = Some(now);

        let items: Vec<AttentionItem> = ids
            .iter()
            .filter_map(|id| queue.get(id).cloned())
            .collect();
        info!(
            mode = %plan.mode,
            count = items.len(),
            breakthrough = plan.breakthrough,
            "delivered attention items"
        );
        Some(DeliveryOutcome {
            mode: plan.mode,
            items,
            synthesis,
        })
    }

    fn paced(&self, min_gap: chrono::Duration, now: DateTime<Local>) -> bool {
        match self.last_delivery {
            Some(last) => now - last >= min_gap,
            None => true,
        }
    }
}

/// Merge items into one message.
///
/// A single item keeps its message verbatim. Otherwise items are grouped by
/// source in order of first appearance; a group of one contributes its
/// message, a larger group contributes `"{n} {source} updates: {a}. {b}"`
/// built from its first two messages. Parts are joined with `". "` and end
/// with a period.
#[must_use]
pub fn synthesize(items: &[AttentionItem]) -> String {
    match items {
        [] => String::new(),
        [only] => only.message.clone(),
        _ => {
            let mut groups: Vec<(AttentionSource, Vec<&str>)> = Vec::new();
            for item in items {
                match groups.iter_mut().find(|(source, _)| *source == item.source) {
                    Some((_, messages)) => messages.push(&item.message),
                    None => groups.push((item.source, vec![&item.message])),
                }
            }
            let parts: Vec<String> = groups
                .into_iter()
                .map(|(source, messages)| match messages.as_slice() {
                    [single] => (*single).to_owned(),
                    _ => format!(
                        "{} {source} updates: {}",
                        messages.len(),
                        messages[..2].join(". ")
                    ),
                })
                .collect();
            format!("{}.", parts.join(". "))
        }
    }
}

fn nudge_title(items: &[AttentionItem]) -> String {
    match items {
        [only] => {
            let label = only.source.as_str();
            let mut chars = label.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        _ => format!("{} updates", items.len()),
    }
}
