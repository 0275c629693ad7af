//! Circadian phases and the attention state derived from them.
//!
//! The day is split into five contiguous phases. Each phase sets the
//! default interruption policy; the focus flag can only make it quieter.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// A named portion of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircadianPhase {
    MorningPilot,
    FocusShield,
    AfternoonFlow,
    EveningWind,
    SleepGuard,
}

impl CircadianPhase {
    /// All phases in day order, starting at 06:00.
    pub const ALL: [CircadianPhase; 5] = [
        Self::MorningPilot,
        Self::FocusShield,
        Self::AfternoonFlow,
        Self::EveningWind,
        Self::SleepGuard,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MorningPilot => "morning_pilot",
            Self::FocusShield => "focus_shield",
            Self::AfternoonFlow => "afternoon_flow",
            Self::EveningWind => "evening_wind",
            Self::SleepGuard => "sleep_guard",
        }
    }
}

impl std::fmt::Display for CircadianPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open hour interval `[start_hour, end_hour)`. An interval with
/// `start_hour > end_hour` wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindow {
    pub phase: CircadianPhase,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl PhaseWindow {
    #[must_use]
    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Daily schedule.
pub const PHASE_SCHEDULE: [PhaseWindow; 5] = [
    PhaseWindow {
        phase: CircadianPhase::MorningPilot,
        start_hour: 6,
        end_hour: 9,
    },
    PhaseWindow {
        phase: CircadianPhase::FocusShield,
        start_hour: 9,
        end_hour: 12,
    },
    PhaseWindow {
        phase: CircadianPhase::AfternoonFlow,
        start_hour: 12,
        end_hour: 17,
    },
    PhaseWindow {
        phase: CircadianPhase::EveningWind,
        start_hour: 17,
        end_hour: 21,
    },
    PhaseWindow {
        phase: CircadianPhase::SleepGuard,
        start_hour: 21,
        end_hour: 6,
    },
];

/// Map a wall-clock time to its phase.
#[must_use]
pub fn detect_phase<T: Timelike>(now: &T) -> CircadianPhase {
    let hour = now.hour();
    PHASE_SCHEDULE
        .iter()
        .find(|window| window.contains_hour(hour))
        .map_or(CircadianPhase::AfternoonFlow, |window| window.phase)
}

/// Momentary interruption permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionState {
    /// Queue only.
    Silent,
    /// Quiet, batched delivery.
    Whisper,
    /// Spoken delivery.
    Speak,
}

impl AttentionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Whisper => "whisper",
            Self::Speak => "speak",
        }
    }
}

impl std::fmt::Display for AttentionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the attention state from the phase and the external focus flag.
#[must_use]
pub fn compute_attention_state(phase: CircadianPhase, focus_active: bool) -> AttentionState {
    match phase {
        CircadianPhase::SleepGuard | CircadianPhase::FocusShield => AttentionState::Silent,
        _ if focus_active => AttentionState::Silent,
        CircadianPhase::MorningPilot => AttentionState::Speak,
        CircadianPhase::AfternoonFlow | CircadianPhase::EveningWind => AttentionState::Whisper,
    }
}
