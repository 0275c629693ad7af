//! The attention engine: owns the queue and runs the tick.
//!
//! One tick is
//! `detect phase → phase entry actions → attention state → context →
//! escalation → delivery → gc`.
//!
//! [`Engine`] is driven directly (tests, embedding in an existing loop) or
//! moved onto its own task with [`Engine::start`].

pub mod runner;

pub use runner::EngineHandle;

use crate::clock::{Clock, SystemClock};
use crate::collaborators::{BatteryStatus, Collaborators, RawNotice};
use crate::config::{CircadianConfig, ConfigPatch};
use crate::context::{ContextAccumulator, UpcomingMeeting};
use crate::delivery::{DeliveryOutcome, DeliveryScheduler, DeliveryTrigger};
use crate::events::{EngineEvent, SubscriberRegistry, Subscription};
use crate::ingest::NotificationIngestor;
use crate::phase::{AttentionState, CircadianPhase, compute_attention_state, detect_phase};
use crate::queue::{AttentionItem, AttentionQueue, NewAttentionItem};
use crate::transition::PhaseTransitionController;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the broadcast event stream.
const EVENT_CAPACITY: usize = 128;

/// Snapshot returned by [`Engine::state`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub phase: CircadianPhase,
    pub attention_state: AttentionState,
    /// Every stored item, delivered ones included.
    pub queue_size: usize,
    pub pending_count: usize,
    pub last_delivery: Option<DateTime<Local>>,
    pub focus_active: bool,
    pub next_meeting: Option<UpcomingMeeting>,
    pub battery: Option<BatteryStatus>,
}

/// Counters from a single tick, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub phase_changed: bool,
    pub pushed: usize,
    pub escalated: usize,
    pub delivered: usize,
    pub collected: usize,
}

pub struct Engine {
    config: CircadianConfig,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    queue: AttentionQueue,
    context: ContextAccumulator,
    delivery: DeliveryScheduler,
    transitions: PhaseTransitionController,
    phase: Option<CircadianPhase>,
    attention_state: Option<AttentionState>,
    subscribers: SubscriberRegistry,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl Engine {
    /// Create an engine reading the system clock.
    pub fn new(config: CircadianConfig, collaborators: Collaborators) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            collaborators,
            clock: Arc::new(SystemClock),
            queue: AttentionQueue::new(),
            context: ContextAccumulator::new(),
            delivery: DeliveryScheduler::new(),
            transitions: PhaseTransitionController::new(),
            phase: None,
            attention_state: None,
            subscribers: SubscriberRegistry::new(),
            events_tx,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CircadianConfig {
        &self.config
    }

    /// Run one full tick.
    pub async fn tick(&mut self) -> TickSummary {
        let now = self.clock.now();
        let mut summary = TickSummary::default();

        let phase = detect_phase(&now);
        if self.phase != Some(phase) {
            summary.phase_changed = true;
            summary.delivered += self.enter_phase(phase, now).await;
        }

        let state = compute_attention_state(phase, self.context.focus_active());
        if self.attention_state != Some(state) {
            let previous = self.attention_state.replace(state);
            info!(phase = %phase, state = %state, "attention state changed");
            self.emit(EngineEvent::AttentionStateChange {
                phase,
                attention_state: state,
                previous,
            });
        }

        summary.pushed = self
            .context
            .accumulate(&self.collaborators, &mut self.queue, now)
            .await;
        summary.escalated = self
            .queue
            .escalate_stale(now, self.config.stale_threshold());
        summary.delivered += self.deliver(DeliveryTrigger::Tick, state, now).await;
        summary.collected = self.queue.gc(now, self.config.delivered_retention());

        debug!(
            phase = %phase,
            state = %state,
            pushed = summary.pushed,
            escalated = summary.escalated,
            delivered = summary.delivered,
            collected = summary.collected,
            queue = self.queue.len(),
            "tick complete"
        );
        summary
    }

    async fn enter_phase(&mut self, phase: CircadianPhase, now: DateTime<Local>) -> usize {
        let previous = self.phase.replace(phase);
        info!(phase = %phase, previous = ?previous, "phase changed");

        let outcome = self
            .transitions
            .enter(phase, &self.collaborators, &self.config.features, now)
            .await;
        let state = compute_attention_state(phase, self.context.focus_active());

        self.emit(EngineEvent::PhaseChange {
            phase,
            attention_state: state,
            previous,
        });
        if let Some(text) = outcome.briefing {
            self.emit(EngineEvent::Briefing {
                phase,
                attention_state: state,
                text,
            });
        }
        if outcome.flush {
            return self.deliver(DeliveryTrigger::PhaseFlush, state, now).await;
        }
        0
    }

    async fn deliver(
        &mut self,
        trigger: DeliveryTrigger,
        state: AttentionState,
        now: DateTime<Local>,
    ) -> usize {
        let outcome = self
            .delivery
            .deliver(
                &mut self.queue,
                &self.collaborators,
                state,
                &self.config,
                trigger,
                now,
            )
            .await;
        match outcome {
            Some(outcome) => {
                let count = outcome.items.len();
                self.emit_delivery(outcome, state, now);
                count
            }
            None => 0,
        }
    }

    fn emit_delivery(&self, outcome: DeliveryOutcome, state: AttentionState, now: DateTime<Local>) {
        self.emit(EngineEvent::Delivery {
            phase: self.phase.unwrap_or_else(|| detect_phase(&now)),
            attention_state: state,
            mode: outcome.mode,
            items: outcome.items,
            synthesis: outcome.synthesis,
        });
    }

    fn emit(&self, event: EngineEvent) {
        self.subscribers.emit(&event);
        // No receivers is fine.
        let _ = self.events_tx.send(event);
    }

    /// Queue an item directly. Returns its id.
    pub fn push_item(&mut self, item: NewAttentionItem) -> String {
        let now = self.clock.now();
        debug!(source = %item.source, priority = %item.priority, "item pushed");
        self.queue.push(item, now)
    }

    /// Classify and queue one device notice.
    pub async fn ingest_notice(&mut self, notice: &RawNotice) -> Option<String> {
        let now = self.clock.now();
        NotificationIngestor::new(self.config.notice_ttl())
            .ingest(self.collaborators.classifier.as_ref(), &mut self.queue, notice, now)
            .await
    }

    /// Classify and queue several notices in one classifier call.
    pub async fn ingest_notices(&mut self, notices: &[RawNotice]) -> Vec<String> {
        let now = self.clock.now();
        NotificationIngestor::new(self.config.notice_ttl())
            .ingest_batch(self.collaborators.classifier.as_ref(), &mut self.queue, notices, now)
            .await
    }

    /// Flush the queue now, ignoring pacing and `silent`.
    pub async fn deliver_now(&mut self) -> Option<DeliveryOutcome> {
        let now = self.clock.now();
        let state = self.current_attention_state(now);
        let outcome = self
            .delivery
            .deliver(
                &mut self.queue,
                &self.collaborators,
                state,
                &self.config,
                DeliveryTrigger::Manual,
                now,
            )
            .await?;
        self.emit_delivery(outcome.clone(), state, now);
        Some(outcome)
    }

    /// Apply a partial config update; it takes effect on the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CircadianError::Config`] when the patched config is
    /// invalid. The current config is kept in that case.
    pub fn set_config(&mut self, patch: &ConfigPatch) -> crate::Result<()> {
        self.config = self.config.patched(patch)?;
        info!(heartbeat_secs = self.config.heartbeat_secs, "config updated");
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        let now = self.clock.now();
        EngineState {
            phase: self.phase.unwrap_or_else(|| detect_phase(&now)),
            attention_state: self.current_attention_state(now),
            queue_size: self.queue.len(),
            pending_count: self.queue.pending_count(now),
            last_delivery: self.delivery.last_delivery(),
            focus_active: self.context.focus_active(),
            next_meeting: self.context.next_meeting().cloned(),
            battery: self.context.battery(),
        }
    }

    /// Pending items in delivery order.
    #[must_use]
    pub fn pending_items(&self) -> Vec<AttentionItem> {
        self.queue.pending(self.clock.now())
    }

    /// Register an event callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Async event stream. Slow receivers lose the oldest events.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    fn current_attention_state(&self, now: DateTime<Local>) -> AttentionState {
        self.attention_state.unwrap_or_else(|| {
            compute_attention_state(detect_phase(&now), self.context.focus_active())
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("phase", &self.phase)
            .field("attention_state", &self.attention_state)
            .field("queue", &self.queue.len())
            .finish_non_exhaustive()
    }
}
