//! Context accumulation from external signal providers.
//!
//! Polled once per tick. Battery and calendar readings turn into attention
//! items when they cross a threshold; the focus flag only feeds the
//! attention state. A failing provider is logged and contributes nothing
//! that tick; the previous reading is kept.

use crate::collaborators::{BatteryStatus, CalendarEvent, Collaborators};
use crate::queue::{AttentionQueue, AttentionSource, NewAttentionItem, Priority};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Look-ahead window requested from the calendar provider.
pub const CALENDAR_WINDOW_MINUTES: u32 = 60;

/// A meeting starting within this many minutes produces an item.
pub const MEETING_ALERT_MINUTES: i64 = 15;

/// A meeting starting within this many minutes is urgent.
pub const MEETING_URGENT_MINUTES: i64 = 5;

/// Battery level at or below which a low-battery item is raised.
pub const BATTERY_LOW_LEVEL: u8 = 15;

/// Battery level at or below which the item is urgent.
pub const BATTERY_CRITICAL_LEVEL: u8 = 5;

/// Nearest upcoming meeting, kept for state reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingMeeting {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Local>,
    /// Whole minutes until start, rounded up.
    pub minutes_until: i64,
}

/// Latest readings from the signal providers.
#[derive(Debug, Clone, Default)]
pub struct ContextAccumulator {
    battery: Option<BatteryStatus>,
    next_meeting: Option<UpcomingMeeting>,
    focus_active: bool,
}

impl ContextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll every provider once and push threshold items. Returns how many
    /// items were pushed.
    pub async fn accumulate(
        &mut self,
        collaborators: &Collaborators,
        queue: &mut AttentionQueue,
        now: DateTime<Local>,
    ) -> usize {
        let mut pushed = 0;

        match collaborators.battery.battery_level().await {
            Ok(status) => {
                self.battery = Some(status);
                if let Some(item) = battery_item(status, queue) {
                    queue.push(item, now);
                    pushed += 1;
                }
            }
            Err(e) => warn!(error = %e, "battery provider failed"),
        }

        match collaborators
            .calendar
            .upcoming_events(CALENDAR_WINDOW_MINUTES)
            .await
        {
            Ok(events) => {
                self.next_meeting = nearest_meeting(&events, now);
                let item = match &self.next_meeting {
                    Some(meeting) => meeting_item(meeting, queue),
                    None => None,
                };
                if let Some(item) = item {
                    queue.push(item, now);
                    pushed += 1;
                }
            }
            Err(e) => warn!(error = %e, "calendar provider failed"),
        }

        match collaborators.focus.is_active().await {
            Ok(active) => self.focus_active = active,
            Err(e) => warn!(error = %e, "focus provider failed"),
        }

        if pushed > 0 {
            debug!(pushed, "context accumulation raised attention items");
        }
        pushed
    }

    #[must_use]
    pub fn battery(&self) -> Option<BatteryStatus> {
        self.battery
    }

    #[must_use]
    pub fn next_meeting(&self) -> Option<&UpcomingMeeting> {
        self.next_meeting.as_ref()
    }

    #[must_use]
    pub fn focus_active(&self) -> bool {
        self.focus_active
    }
}

fn battery_item(status: BatteryStatus, queue: &AttentionQueue) -> Option<NewAttentionItem> {
    if status.charging || status.level > BATTERY_LOW_LEVEL {
        return None;
    }
    let (priority, key) = if status.level <= BATTERY_CRITICAL_LEVEL {
        (Priority::Urgent, "battery:critical")
    } else {
        (Priority::High, "battery:low")
    };
    if queue.has_key(key) {
        return None;
    }
    Some(
        NewAttentionItem::new(
            AttentionSource::Battery,
            priority,
            format!("Battery at {}%. Charge soon.", status.level),
        )
        .with_dedupe_key(key)
        .with_data("level", status.level),
    )
}

fn nearest_meeting(events: &[CalendarEvent], now: DateTime<Local>) -> Option<UpcomingMeeting> {
    let horizon = now + chrono::Duration::minutes(i64::from(CALENDAR_WINDOW_MINUTES));
    events
        .iter()
        .filter(|event| event.start_time > now && event.start_time <= horizon)
        .min_by_key(|event| event.start_time)
        .map(|event| {
            let secs = (event.start_time - now).num_seconds();
            UpcomingMeeting {
                id: event.id.clone(),
                title: event.title.clone(),
                start_time: event.start_time,
                minutes_until: (secs + 59) / 60,
            }
        })
}

fn meeting_item(meeting: &UpcomingMeeting, queue: &AttentionQueue) -> Option<NewAttentionItem> {
    let minutes = meeting.minutes_until;
    if minutes <= 0 || minutes > MEETING_ALERT_MINUTES {
        return None;
    }
    let key = format!("calendar:{}", meeting.id);
    if queue.has_key(&key) {
        return None;
    }
    let priority = if minutes <= MEETING_URGENT_MINUTES {
        Priority::Urgent
    } else {
        Priority::High
    };
    Some(
        NewAttentionItem::new(
            AttentionSource::Calendar,
            priority,
            format!("{} in {minutes} min", meeting.title),
        )
        .with_dedupe_key(key)
        .with_data("event_id", meeting.id.clone()),
    )
}
