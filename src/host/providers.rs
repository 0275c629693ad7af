//! Collaborators backed by the stdio protocol.
//!
//! Signal providers return whatever the host last reported. Output channels
//! forward each request as an [`OutputActivity`] to be written to stdout.

use crate::clock::Clock;
use crate::collaborators::{
    BatteryProvider, BatteryStatus, CalendarEvent, CalendarProvider, Collaborators,
    DeviceActionDispatcher, FocusProvider, HapticChannel, Noop, NudgeChannel, NudgeMessage,
    SpeechChannel,
};
use crate::error::CircadianError;
use crate::host::contract::OutputActivity;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Signals {
    battery: Option<BatteryStatus>,
    focus_active: bool,
    events: Vec<CalendarEvent>,
}

/// Battery, calendar and focus readings pushed in by the host.
pub struct StdioSignals {
    clock: Arc<dyn Clock>,
    inner: Mutex<Signals>,
}

impl StdioSignals {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Signals::default()),
        }
    }

    /// # Errors
    ///
    /// Returns [`CircadianError::Host`] for a level above 100.
    pub fn set_battery(&self, level: u8, charging: bool) -> crate::Result<()> {
        if level > 100 {
            return Err(CircadianError::Host(format!(
                "battery level {level} is outside 0-100"
            )));
        }
        self.lock().battery = Some(BatteryStatus { level, charging });
        Ok(())
    }

    pub fn set_focus(&self, active: bool) {
        self.lock().focus_active = active;
    }

    pub fn set_events(&self, mut events: Vec<CalendarEvent>) {
        events.sort_by_key(|event| event.start_time);
        self.lock().events = events;
    }

    fn lock(&self) -> MutexGuard<'_, Signals> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for StdioSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioSignals")
            .field("signals", &*self.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BatteryProvider for StdioSignals {
    async fn battery_level(&self) -> anyhow::Result<BatteryStatus> {
        let battery = self.lock().battery;
        battery.ok_or_else(|| {
            CircadianError::Provider("no battery reading received yet".to_owned()).into()
        })
    }
}

#[async_trait]
impl CalendarProvider for StdioSignals {
    async fn upcoming_events(&self, window_minutes: u32) -> anyhow::Result<Vec<CalendarEvent>> {
        let now = self.clock.now();
        let horizon = now + chrono::Duration::minutes(i64::from(window_minutes));
        Ok(self
            .lock()
            .events
            .iter()
            .filter(|event| event.start_time > now && event.start_time <= horizon)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FocusProvider for StdioSignals {
    async fn is_active(&self) -> anyhow::Result<bool> {
        Ok(self.lock().focus_active)
    }
}

/// Output channels that report to the host instead of acting.
#[derive(Debug, Clone)]
pub struct StdioOutputs {
    tx: mpsc::UnboundedSender<OutputActivity>,
}

impl StdioOutputs {
    pub fn new(tx: mpsc::UnboundedSender<OutputActivity>) -> Self {
        Self { tx }
    }

    fn send(&self, activity: OutputActivity) -> anyhow::Result<()> {
        self.tx
            .send(activity)
            .map_err(|_| CircadianError::Channel("host output stream closed".to_owned()))?;
        Ok(())
    }
}

#[async_trait]
impl SpeechChannel for StdioOutputs {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        self.send(OutputActivity::Speech {
            text: text.to_owned(),
        })
    }
}

#[async_trait]
impl NudgeChannel for StdioOutputs {
    async fn push(&self, nudge: NudgeMessage) -> anyhow::Result<()> {
        self.send(OutputActivity::Nudge { nudge })
    }
}

#[async_trait]
impl HapticChannel for StdioOutputs {
    async fn attention(&self) -> anyhow::Result<()> {
        self.send(OutputActivity::Haptic {
            pattern: "attention".to_owned(),
        })
    }

    async fn tap(&self) -> anyhow::Result<()> {
        self.send(OutputActivity::Haptic {
            pattern: "tap".to_owned(),
        })
    }
}

#[async_trait]
impl DeviceActionDispatcher for StdioOutputs {
    async fn dispatch(&self, action_id: &str, args: serde_json::Value) -> anyhow::Result<()> {
        self.send(OutputActivity::DeviceAction {
            action_id: action_id.to_owned(),
            args,
        })
    }
}

/// Wire host signals and outputs into a collaborator bundle. The classifier
/// and briefing generator are the inert defaults.
pub fn host_collaborators(signals: &Arc<StdioSignals>, outputs: &StdioOutputs) -> Collaborators {
    let outputs = Arc::new(outputs.clone());
    let noop = Arc::new(Noop);
    Collaborators {
        battery: signals.clone(),
        calendar: signals.clone(),
        focus: signals.clone(),
        classifier: noop.clone(),
        briefings: noop,
        device: outputs.clone(),
        haptic: outputs.clone(),
        nudge: outputs.clone(),
        tts: outputs,
    }
}
