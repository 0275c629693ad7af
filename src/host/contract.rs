//! Wire format of the headless host: one JSON object per line.
//!
//! Commands arrive on stdin tagged by `command`; everything written to
//! stdout is tagged by `type` (`response`, `event` or `output`).

use crate::collaborators::{CalendarEvent, NudgeMessage, RawNotice};
use crate::config::ConfigPatch;
use crate::events::EngineEvent;
use crate::queue::NewAttentionItem;
use serde::{Deserialize, Serialize};

/// Command read from stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    /// Queue an attention item as-is.
    PushItem(NewAttentionItem),
    /// Classify and queue one device notice.
    Notice(RawNotice),
    /// Classify and queue several notices together.
    Notices { notices: Vec<RawNotice> },
    /// Latest battery reading.
    Battery {
        level: u8,
        #[serde(default)]
        charging: bool,
    },
    /// Focus mode flag.
    Focus { active: bool },
    /// Replace the known calendar.
    Calendar { events: Vec<CalendarEvent> },
    DeliverNow,
    State,
    Pending,
    SetConfig(ConfigPatch),
    Stop,
}

impl HostCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PushItem(_) => "push_item",
            Self::Notice(_) => "notice",
            Self::Notices { .. } => "notices",
            Self::Battery { .. } => "battery",
            Self::Focus { .. } => "focus",
            Self::Calendar { .. } => "calendar",
            Self::DeliverNow => "deliver_now",
            Self::State => "state",
            Self::Pending => "pending",
            Self::SetConfig(_) => "set_config",
            Self::Stop => "stop",
        }
    }
}

/// Line written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Response {
        command: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Event {
        event: EngineEvent,
    },
    Output {
        output: OutputActivity,
    },
}

impl HostMessage {
    pub fn ok(command: impl Into<String>, result: Option<serde_json::Value>) -> Self {
        Self::Response {
            command: command.into(),
            ok: true,
            result,
            error: None,
        }
    }

    pub fn error(command: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Response {
            command: command.into(),
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Something the engine asked an output channel to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum OutputActivity {
    Speech { text: String },
    Nudge { nudge: NudgeMessage },
    Haptic { pattern: String },
    DeviceAction {
        action_id: String,
        args: serde_json::Value,
    },
}
