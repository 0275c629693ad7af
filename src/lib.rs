//! Circadian attention scheduler.
//!
//! Decides when, how and whether to interrupt a device user. Time of day
//! selects a phase, the phase (and the focus flag) selects an attention
//! state, and the attention state governs how a priority queue of pending
//! notices is delivered.
//!
//! # Architecture
//!
//! Each engine tick flows one way:
//! - **Phase**: wall clock mapped to one of five circadian phases
//! - **Context**: battery, calendar and focus providers polled for new items
//! - **Queue**: stale items escalated, expired and old delivered items dropped
//! - **Delivery**: pending items batched, synthesized and sent to speech or nudge
//! - **Events**: phase, attention state, delivery and briefing events published
//!
//! Every external system is injected through the traits in
//! [`collaborators`].

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod ingest;
pub mod phase;
pub mod queue;
pub mod transition;

#[cfg(test)]
mod test_utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::Collaborators;
pub use config::{CircadianConfig, ConfigPatch, PhaseFeatures};
pub use engine::{Engine, EngineHandle, EngineState};
pub use error::{CircadianError, Result};
pub use events::{EngineEvent, Subscription};
pub use phase::{AttentionState, CircadianPhase};
pub use queue::{AttentionItem, AttentionSource, DeliveryMode, NewAttentionItem, Priority};
