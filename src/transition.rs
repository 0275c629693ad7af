//! Side effects fired on phase entry.
//!
//! Briefings run at most once per calendar day each. Device actions are
//! requested and their failures logged; they never fail the tick.

use crate::collaborators::{Collaborators, DeviceAction};
use crate::config::PhaseFeatures;
use crate::phase::CircadianPhase;
use chrono::{DateTime, Local, NaiveDate};
use tracing::{info, warn};

/// Display brightness requested when the morning starts.
pub const MORNING_BRIGHTNESS: f32 = 0.8;
/// Brightness for the evening wind-down.
pub const EVENING_BRIGHTNESS: f32 = 0.4;
/// Brightness for the night.
pub const SLEEP_BRIGHTNESS: f32 = 0.1;

/// What the engine still has to do after a phase entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Text of a briefing that was spoken.
    pub briefing: Option<String>,
    /// Queue should be flushed once, outside the usual pacing.
    pub flush: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PhaseTransitionController {
    last_morning_briefing: Option<NaiveDate>,
    last_evening_review: Option<NaiveDate>,
}

impl PhaseTransitionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the entry actions for `phase`.
    pub async fn enter(
        &mut self,
        phase: CircadianPhase,
        collaborators: &Collaborators,
        features: &PhaseFeatures,
        now: DateTime<Local>,
    ) -> TransitionOutcome {
        let today = now.date_naive();
        let mut outcome = TransitionOutcome::default();

        match phase {
            CircadianPhase::MorningPilot => {
                if features.morning_briefing && self.last_morning_briefing != Some(today) {
                    outcome.briefing = speak_briefing(collaborators, Briefing::Morning).await;
                    if outcome.briefing.is_some() {
                        self.last_morning_briefing = Some(today);
                    }
                }
                if features.brightness {
                    dispatch(collaborators, DeviceAction::SetBrightness { level: MORNING_BRIGHTNESS }).await;
                }
            }
            CircadianPhase::FocusShield => {
                if features.focus_dnd {
                    dispatch(collaborators, DeviceAction::ToggleDnd { enabled: true }).await;
                }
            }
            CircadianPhase::AfternoonFlow => {
                if features.focus_dnd {
                    dispatch(collaborators, DeviceAction::ToggleDnd { enabled: false }).await;
                }
                outcome.flush = features.afternoon_flush;
            }
            CircadianPhase::EveningWind => {
                if features.evening_review && self.last_evening_review != Some(today) {
                    outcome.briefing = speak_briefing(collaborators, Briefing::Evening).await;
                    if outcome.briefing.is_some() {
                        self.last_evening_review = Some(today);
                    }
                }
                if features.brightness {
                    dispatch(collaborators, DeviceAction::SetBrightness { level: EVENING_BRIGHTNESS }).await;
                }
            }
            CircadianPhase::SleepGuard => {
                if features.sleep_dnd {
                    dispatch(collaborators, DeviceAction::ToggleDnd { enabled: true }).await;
                }
                if features.brightness {
                    dispatch(collaborators, DeviceAction::SetBrightness { level: SLEEP_BRIGHTNESS }).await;
                }
            }
        }

        outcome
    }
}

#[derive(Debug, Clone, Copy)]
enum Briefing {
    Morning,
    Evening,
}

async fn speak_briefing(collaborators: &Collaborators, kind: Briefing) -> Option<String> {
    let generated = match kind {
        Briefing::Morning => collaborators.briefings.morning_briefing().await,
        Briefing::Evening => collaborators.briefings.evening_briefing().await,
    };
    let text = match generated {
        Ok(briefing) => briefing.spoken_text(),
        Err(e) => {
            warn!(error = %e, ?kind, "briefing generation failed");
            return None;
        }
    };
    if text.is_empty() {
        return None;
    }
    if let Err(e) = collaborators.tts.speak(&text).await {
        warn!(error = %e, ?kind, "failed to speak briefing");
        return None;
    }
    info!(?kind, "briefing spoken");
    Some(text)
}

async fn dispatch(collaborators: &Collaborators, action: DeviceAction) {
    if let Err(e) = collaborators
        .device
        .dispatch(action.id(), action.args())
        .await
    {
        warn!(error = %e, action = action.id(), "device action failed");
    }
}
