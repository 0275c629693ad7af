//! Shared helpers for integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use circadian::collaborators::{
    BatteryProvider, BatteryStatus, Briefing, BriefingGenerator, CalendarEvent, CalendarProvider,
    ClassifiedNotice, Collaborators, DeviceActionDispatcher, FocusProvider, HapticChannel,
    NoticeCategory, NotificationClassifier, NudgeChannel, NudgeMessage, RawNotice, SpeechChannel,
};
use std::sync::{Arc, Mutex};

/// Local time on 2026-01-14.
pub(crate) fn at(hour: u32, min: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 1, 14, hour, min, 0)
        .single()
        .expect("unambiguous local time")
}

/// Everything the engine did to the outside world, in call order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    Spoke(String),
    Nudged(NudgeMessage),
    Haptic(&'static str),
    Action(String, serde_json::Value),
}

/// Scriptable collaborator set that records every effect.
#[derive(Default)]
pub(crate) struct World {
    battery: Mutex<Option<BatteryStatus>>,
    events: Mutex<Vec<CalendarEvent>>,
    focus: Mutex<bool>,
    effects: Mutex<Vec<Effect>>,
}

impl World {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            battery: Mutex::new(Some(BatteryStatus {
                level: 90,
                charging: false,
            })),
            ..Self::default()
        })
    }

    pub(crate) fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            battery: self.clone(),
            calendar: self.clone(),
            focus: self.clone(),
            classifier: self.clone(),
            briefings: self.clone(),
            device: self.clone(),
            haptic: self.clone(),
            nudge: self.clone(),
            tts: self.clone(),
        }
    }

    pub(crate) fn set_battery(&self, level: u8, charging: bool) {
        *self.battery.lock().unwrap() = Some(BatteryStatus { level, charging });
    }

    pub(crate) fn set_events(&self, events: Vec<CalendarEvent>) {
        *self.events.lock().unwrap() = events;
    }

    pub(crate) fn set_focus(&self, active: bool) {
        *self.focus.lock().unwrap() = active;
    }

    pub(crate) fn take_effects(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.effects.lock().unwrap())
    }

    fn record(&self, effect: Effect) {
        self.effects.lock().unwrap().push(effect);
    }
}

#[async_trait]
impl BatteryProvider for World {
    async fn battery_level(&self) -> anyhow::Result<BatteryStatus> {
        self.battery
            .lock()
            .unwrap()
            .ok_or_else(|| anyhow::anyhow!("battery unavailable"))
    }
}

#[async_trait]
impl CalendarProvider for World {
    async fn upcoming_events(&self, _window_minutes: u32) -> anyhow::Result<Vec<CalendarEvent>> {
        Ok(self.events.lock().unwrap().clone())
    }
}

#[async_trait]
impl FocusProvider for World {
    async fn is_active(&self) -> anyhow::Result<bool> {
        Ok(*self.focus.lock().unwrap())
    }
}

#[async_trait]
impl NotificationClassifier for World {
    async fn classify(&self, notice: &RawNotice) -> anyhow::Result<ClassifiedNotice> {
        // Anything from "spam" is noise; the rest keeps its declared category.
        let category = if notice.app == "spam" {
            NoticeCategory::Noise
        } else {
            notice.category.unwrap_or(NoticeCategory::Informational)
        };
        Ok(ClassifiedNotice {
            category,
            app: notice.app.clone(),
            title: notice.title.clone(),
            text: notice.text.clone(),
        })
    }
}

#[async_trait]
impl BriefingGenerator for World {
    async fn morning_briefing(&self) -> anyhow::Result<Briefing> {
        Ok(Briefing {
            greeting: "Good morning.".to_owned(),
            summary: "Clear skies.".to_owned(),
        })
    }

    async fn evening_briefing(&self) -> anyhow::Result<Briefing> {
        Ok(Briefing {
            greeting: "Good evening.".to_owned(),
            summary: "Inbox zero.".to_owned(),
        })
    }
}

#[async_trait]
impl DeviceActionDispatcher for World {
    async fn dispatch(&self, action_id: &str, args: serde_json::Value) -> anyhow::Result<()> {
        self.record(Effect::Action(action_id.to_owned(), args));
        Ok(())
    }
}

#[async_trait]
impl HapticChannel for World {
    async fn attention(&self) -> anyhow::Result<()> {
        self.record(Effect::Haptic("attention"));
        Ok(())
    }

    async fn tap(&self) -> anyhow::Result<()> {
        self.record(Effect::Haptic("tap"));
        Ok(())
    }
}

#[async_trait]
impl NudgeChannel for World {
    async fn push(&self, nudge: NudgeMessage) -> anyhow::Result<()> {
        self.record(Effect::Nudged(nudge));
        Ok(())
    }
}

#[async_trait]
impl SpeechChannel for World {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        self.record(Effect::Spoke(text.to_owned()));
        Ok(())
    }
}
