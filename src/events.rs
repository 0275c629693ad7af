//! Engine events and the subscriber registry.
//!
//! Subscribers are plain callbacks invoked synchronously on the engine task.
//! A panicking callback is caught and logged; the remaining subscribers
//! and the tick carry on.

use crate::phase::{AttentionState, CircadianPhase};
use crate::queue::{AttentionItem, DeliveryMode};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::warn;

/// Everything the engine reports to the rest of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    PhaseChange {
        phase: CircadianPhase,
        attention_state: AttentionState,
        /// `None` on the first tick after start.
        previous: Option<CircadianPhase>,
    },
    AttentionStateChange {
        phase: CircadianPhase,
        attention_state: AttentionState,
        previous: Option<AttentionState>,
    },
    Delivery {
        phase: CircadianPhase,
        attention_state: AttentionState,
        mode: DeliveryMode,
        items: Vec<AttentionItem>,
        synthesis: String,
    },
    Briefing {
        phase: CircadianPhase,
        attention_state: AttentionState,
        text: String,
    },
}

impl EngineEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PhaseChange { .. } => "phase_change",
            Self::AttentionStateChange { .. } => "attention_state_change",
            Self::Delivery { .. } => "delivery",
            Self::Briefing { .. } => "briefing",
        }
    }

    #[must_use]
    pub fn phase(&self) -> CircadianPhase {
        match self {
            Self::PhaseChange { phase, .. }
            | Self::AttentionStateChange { phase, .. }
            | Self::Delivery { phase, .. }
            | Self::Briefing { phase, .. } => *phase,
        }
    }

    #[must_use]
    pub fn attention_state(&self) -> AttentionState {
        match self {
            Self::PhaseChange { attention_state, .. }
            | Self::AttentionStateChange { attention_state, .. }
            | Self::Delivery { attention_state, .. }
            | Self::Briefing { attention_state, .. } => *attention_state,
        }
    }
}

/// Subscriber callback.
pub type EventCallback = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: Vec<(u64, EventCallback)>,
}

/// Shared list of event callbacks.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<Subscribers>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. Keep the returned [`Subscription`] to remove it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let mut subs = lock(&self.inner);
        let id = subs.next_id;
        subs.next_id += 1;
        subs.callbacks.push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every callback with `event`.
    pub fn emit(&self, event: &EngineEvent) {
        // Snapshot so callbacks may subscribe or unsubscribe re-entrantly.
        let callbacks: Vec<(u64, EventCallback)> = lock(&self.inner).callbacks.clone();
        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(subscriber = id, event = event.kind(), "event subscriber panicked");
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Handle returned by [`SubscriberRegistry::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    /// Remove the callback. Events already being emitted may still reach it.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.registry.upgrade() {
            lock(&inner).callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(inner: &Mutex<Subscribers>) -> MutexGuard<'_, Subscribers> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}
