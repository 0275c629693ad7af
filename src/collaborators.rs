//! Contracts for everything outside the scheduler core.
//!
//! Signal providers, the notification classifier, the briefing generator,
//! the device-action dispatcher and the output channels are all injected
//! as trait objects. The core only calls them; failures come back as
//! `anyhow::Result` and are absorbed by the caller.

use crate::queue::Priority;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Battery snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge level, 0-100.
    pub level: u8,
    pub charging: bool,
}

/// Upcoming calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Local>,
}

/// Notice as it arrives from the device, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNotice {
    pub app: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Category pre-assigned by the sender, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<NoticeCategory>,
}

/// Classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeCategory {
    Urgent,
    Important,
    Informational,
    Noise,
}

impl NoticeCategory {
    /// Queue priority for this category; `None` means the notice is dropped.
    #[must_use]
    pub fn priority(self) -> Option<Priority> {
        match self {
            Self::Urgent => Some(Priority::Urgent),
            Self::Important => Some(Priority::High),
            Self::Informational => Some(Priority::Medium),
            Self::Noise => None,
        }
    }
}

/// Classified notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedNotice {
    pub category: NoticeCategory,
    pub app: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// Narrative produced by the briefing generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Briefing {
    pub greeting: String,
    pub summary: String,
}

impl Briefing {
    /// Text to speak: greeting followed by summary.
    #[must_use]
    pub fn spoken_text(&self) -> String {
        match (self.greeting.trim(), self.summary.trim()) {
            ("", summary) => summary.to_owned(),
            (greeting, "") => greeting.to_owned(),
            (greeting, summary) => format!("{greeting} {summary}"),
        }
    }
}

/// Push payload for the nudge channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeMessage {
    pub title: String,
    pub message: String,
    pub priority: Priority,
    /// Seconds until the nudge may be discarded by the device.
    pub expires_in_secs: u64,
}

/// Device actions the scheduler requests on phase entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeviceAction {
    ToggleDnd { enabled: bool },
    SetBrightness { level: f32 },
}

impl DeviceAction {
    /// Dispatcher action id.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::ToggleDnd { .. } => "toggle_dnd",
            Self::SetBrightness { .. } => "set_brightness",
        }
    }

    /// Dispatcher arguments.
    #[must_use]
    pub fn args(&self) -> serde_json::Value {
        match self {
            Self::ToggleDnd { enabled } => serde_json::json!({ "enabled": enabled }),
            Self::SetBrightness { level } => serde_json::json!({ "level": level }),
        }
    }
}

#[async_trait]
pub trait BatteryProvider: Send + Sync {
    async fn battery_level(&self) -> anyhow::Result<BatteryStatus>;
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Events starting within the next `window_minutes`, soonest first.
    async fn upcoming_events(&self, window_minutes: u32) -> anyhow::Result<Vec<CalendarEvent>>;
}

#[async_trait]
pub trait FocusProvider: Send + Sync {
    async fn is_active(&self) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait NotificationClassifier: Send + Sync {
    async fn classify(&self, notice: &RawNotice) -> anyhow::Result<ClassifiedNotice>;

    /// Classify several notices at once. The default classifies one by one
    /// and fails on the first error.
    async fn classify_batch(&self, notices: &[RawNotice]) -> anyhow::Result<Vec<ClassifiedNotice>> {
        let mut classified = Vec::with_capacity(notices.len());
        for notice in notices {
            classified.push(self.classify(notice).await?);
        }
        Ok(classified)
    }
}

#[async_trait]
pub trait BriefingGenerator: Send + Sync {
    async fn morning_briefing(&self) -> anyhow::Result<Briefing>;
    async fn evening_briefing(&self) -> anyhow::Result<Briefing>;
}

#[async_trait]
pub trait DeviceActionDispatcher: Send + Sync {
    async fn dispatch(&self, action_id: &str, args: serde_json::Value) -> anyhow::Result<()>;
}

#[async_trait]
pub trait HapticChannel: Send + Sync {
    /// Strong pattern announcing an interruption.
    async fn attention(&self) -> anyhow::Result<()>;
    /// Light tap accompanying a quiet delivery.
    async fn tap(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait NudgeChannel: Send + Sync {
    async fn push(&self, nudge: NudgeMessage) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SpeechChannel: Send + Sync {
    async fn speak(&self, text: &str) -> anyhow::Result<()>;
}

/// All injected collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub battery: Arc<dyn BatteryProvider>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub focus: Arc<dyn FocusProvider>,
    pub classifier: Arc<dyn NotificationClassifier>,
    pub briefings: Arc<dyn BriefingGenerator>,
    pub device: Arc<dyn DeviceActionDispatcher>,
    pub haptic: Arc<dyn HapticChannel>,
    pub nudge: Arc<dyn NudgeChannel>,
    pub tts: Arc<dyn SpeechChannel>,
}

impl Collaborators {
    /// Collaborators that report nothing and swallow every output.
    pub fn noop() -> Self {
        let noop = Arc::new(Noop);
        Self {
            battery: noop.clone(),
            calendar: noop.clone(),
            focus: noop.clone(),
            classifier: noop.clone(),
            briefings: noop.clone(),
            device: noop.clone(),
            haptic: noop.clone(),
            nudge: noop.clone(),
            tts: noop,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Inert collaborator: full battery, empty calendar, no focus, every
/// notice informational, empty briefings, outputs discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

#[async_trait]
impl BatteryProvider for Noop {
    async fn battery_level(&self) -> anyhow::Result<BatteryStatus> {
        Ok(BatteryStatus {
            level: 100,
            charging: true,
        })
    }
}

#[async_trait]
impl CalendarProvider for Noop {
    async fn upcoming_events(&self, _window_minutes: u32) -> anyhow::Result<Vec<CalendarEvent>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl FocusProvider for Noop {
    async fn is_active(&self) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[async_trait]
impl NotificationClassifier for Noop {
    async fn classify(&self, notice: &RawNotice) -> anyhow::Result<ClassifiedNotice> {
        Ok(ClassifiedNotice {
            category: notice.category.unwrap_or(NoticeCategory::Informational),
            app: notice.app.clone(),
            title: notice.title.clone(),
            text: notice.text.clone(),
        })
    }
}

#[async_trait]
impl BriefingGenerator for Noop {
    async fn morning_briefing(&self) -> anyhow::Result<Briefing> {
        Ok(Briefing {
            greeting: "Good morning.".to_owned(),
            summary: String::new(),
        })
    }

    async fn evening_briefing(&self) -> anyhow::Result<Briefing> {
        Ok(Briefing {
            greeting: "Good evening.".to_owned(),
            summary: String::new(),
        })
    }
}

#[async_trait]
impl DeviceActionDispatcher for Noop {
    async fn dispatch(&self, _action_id: &str, _args: serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl HapticChannel for Noop {
    async fn attention(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn tap(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl NudgeChannel for Noop {
    async fn push(&self, _nudge: NudgeMessage) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SpeechChannel for Noop {
    async fn speak(&self, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
