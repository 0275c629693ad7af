//! Shared test utilities used across multiple test modules.
//!
//! `FakeWorld` implements every collaborator trait, returns scripted
//! signals and records every output so tests can assert on side effects.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::collaborators::{
    BatteryProvider, BatteryStatus, Briefing, BriefingGenerator, CalendarEvent, CalendarProvider,
    ClassifiedNotice, Collaborators, DeviceActionDispatcher, FocusProvider, HapticChannel,
    NotificationClassifier, NudgeChannel, NudgeMessage, RawNotice, SpeechChannel,
};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use std::sync::{Arc, Mutex};

/// Local time on a fixed winter day (no DST transitions anywhere).
pub fn local(hour: u32, min: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 1, 14, hour, min, 0)
        .single()
        .expect("unambiguous local time")
}

/// Same as [`local`] but on the following day.
pub fn next_day(hour: u32, min: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 1, 15, hour, min, 0)
        .single()
        .expect("unambiguous local time")
}

pub struct FakeWorld {
    pub battery: Mutex<Result<BatteryStatus, String>>,
    pub events: Mutex<Result<Vec<CalendarEvent>, String>>,
    pub focus: Mutex<Result<bool, String>>,
    pub classify_fails: Mutex<bool>,
    pub speech_fails: Mutex<bool>,
    pub device_fails: Mutex<bool>,
    pub spoken: Mutex<Vec<String>>,
    pub nudges: Mutex<Vec<NudgeMessage>>,
    pub haptics: Mutex<Vec<&'static str>>,
    pub actions: Mutex<Vec<(String, serde_json::Value)>>,
    pub briefings: Mutex<Vec<&'static str>>,
}

impl FakeWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            battery: Mutex::new(Ok(BatteryStatus {
                level: 80,
                charging: false,
            })),
            events: Mutex::new(Ok(Vec::new())),
            focus: Mutex::new(Ok(false)),
            classify_fails: Mutex::new(false),
            speech_fails: Mutex::new(false),
            device_fails: Mutex::new(false),
            spoken: Mutex::new(Vec::new()),
            nudges: Mutex::new(Vec::new()),
            haptics: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            briefings: Mutex::new(Vec::new()),
        })
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
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

    pub fn set_battery(&self, level: u8, charging: bool) {
        *self.battery.lock().unwrap() = Ok(BatteryStatus { level, charging });
    }

    pub fn set_events(&self, events: Vec<CalendarEvent>) {
        *self.events.lock().unwrap() = Ok(events);
    }

    pub fn set_focus(&self, active: bool) {
        *self.focus.lock().unwrap() = Ok(active);
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn nudges(&self) -> Vec<NudgeMessage> {
        self.nudges.lock().unwrap().clone()
    }

    pub fn haptics(&self) -> Vec<&'static str> {
        self.haptics.lock().unwrap().clone()
    }

    pub fn action_ids(&self) -> Vec<String> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn actions(&self) -> Vec<(String, serde_json::Value)> {
        self.actions.lock().unwrap().clone()
    }

    pub fn briefings(&self) -> Vec<&'static str> {
        self.briefings.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatteryProvider for FakeWorld {
    async fn battery_level(&self) -> anyhow::Result<BatteryStatus> {
        self.battery.lock().unwrap().clone().map_err(anyhow::Error::msg)
    }
}

#[async_trait]
impl CalendarProvider for FakeWorld {
    async fn upcoming_events(&self, _window_minutes: u32) -> anyhow::Result<Vec<CalendarEvent>> {
        self.events.lock().unwrap().clone().map_err(anyhow::Error::msg)
    }
}

#[async_trait]
impl FocusProvider for FakeWorld {
    async fn is_active(&self) -> anyhow::Result<bool> {
        self.focus.lock().unwrap().clone().map_err(anyhow::Error::msg)
    }
}

#[async_trait]
impl NotificationClassifier for FakeWorld {
    async fn classify(&self, notice: &RawNotice) -> anyhow::Result<ClassifiedNotice> {
        if *self.classify_fails.lock().unwrap() {
            anyhow::bail!("classifier offline");
        }
        Ok(ClassifiedNotice {
            category: notice
                .category
                .unwrap_or(crate::collaborators::NoticeCategory::Informational),
            app: notice.app.clone(),
            title: notice.title.clone(),
            text: notice.text.clone(),
        })
    }
}

#[async_trait]
impl BriefingGenerator for FakeWorld {
    async fn morning_briefing(&self) -> anyhow::Result<Briefing> {
        self.briefings.lock().unwrap().push("morning");
        Ok(Briefing {
            greeting: "Good morning.".to_owned(),
            summary: "Three meetings today.".to_owned(),
        })
    }

    async fn evening_briefing(&self) -> anyhow::Result<Briefing> {
        self.briefings.lock().unwrap().push("evening");
        Ok(Briefing {
            greeting: "Good evening.".to_owned(),
            summary: "You closed five tasks.".to_owned(),
        })
    }
}

#[async_trait]
impl DeviceActionDispatcher for FakeWorld {
    async fn dispatch(&self, action_id: &str, args: serde_json::Value) -> anyhow::Result<()> {
        self.actions
            .lock()
            .unwrap()
            .push((action_id.to_owned(), args));
        if *self.device_fails.lock().unwrap() {
            anyhow::bail!("device unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl HapticChannel for FakeWorld {
    async fn attention(&self) -> anyhow::Result<()> {
        self.haptics.lock().unwrap().push("attention");
        Ok(())
    }

    async fn tap(&self) -> anyhow::Result<()> {
        self.haptics.lock().unwrap().push("tap");
        Ok(())
    }
}

#[async_trait]
impl NudgeChannel for FakeWorld {
    async fn push(&self, nudge: NudgeMessage) -> anyhow::Result<()> {
        self.nudges.lock().unwrap().push(nudge);
        Ok(())
    }
}

#[async_trait]
impl SpeechChannel for FakeWorld {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        if *self.speech_fails.lock().unwrap() {
            anyhow::bail!("speaker busy");
        }
        self.spoken.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}
