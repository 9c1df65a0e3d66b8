use crate::core::api_logs::{ApiLogBook, LogChannel};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Calendar API error: {0}")]
    Api(String),
    #[error("Calendar storage error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for CalendarError {
    fn from(e: sqlx::Error) -> Self {
        CalendarError::Store(e.to_string())
    }
}

/// A calendar event in the assistant's local timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Option<String>,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: Option<String>,
    pub description: Option<String>,
    pub organizer: String,
    pub attendees: Vec<String>,
}

/// A period during which `attendee` is not available.
#[derive(Debug, Clone, PartialEq)]
pub struct BusyInterval {
    pub attendee: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// A candidate meeting slot on some day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub duration_minutes: u32,
}

impl TimeSlot {
    pub fn label(&self) -> String {
        format!("{} - {}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// One attendee's events for a day, as shown by `display_schedules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendeeSchedule {
    pub attendee: String,
    pub events: Vec<ScheduledItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledItem {
    pub title: String,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}

#[async_trait]
pub trait CalendarBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn busy_intervals(
        &self,
        date: NaiveDate,
        attendees: &[String],
    ) -> Result<Vec<BusyInterval>, CalendarError>;

    async fn events_for(
        &self,
        date: NaiveDate,
        attendee: &str,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// Stores the event and returns its backend id.
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, CalendarError>;
}

/// Working-day constraints for slot search.
#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub buffer_minutes: i64,
    pub step_minutes: i64,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            work_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            buffer_minutes: 15,
            step_minutes: 30,
        }
    }
}

/// Every slot of `duration_minutes` inside working hours whose buffered
/// window does not overlap any busy interval.
pub fn free_slots(
    rules: &SchedulingRules,
    date: NaiveDate,
    busy: &[BusyInterval],
    duration_minutes: u32,
) -> Vec<TimeSlot> {
    let day_end = date.and_time(rules.work_end);
    let duration = Duration::minutes(i64::from(duration_minutes.max(1)));
    let buffer = Duration::minutes(rules.buffer_minutes.max(0));
    let step = Duration::minutes(rules.step_minutes.max(1));

    let mut slots = Vec::new();
    let mut start = date.and_time(rules.work_start);
    while start + duration <= day_end {
        let end = start + duration;
        let window_start = start - buffer;
        let window_end = end + buffer;
        let clash = busy
            .iter()
            .any(|b| b.start < window_end && b.end > window_start);
        if !clash {
            slots.push(TimeSlot {
                start: start.time(),
                end: end.time(),
                duration_minutes,
            });
        }
        start += step;
    }
    slots
}

pub struct CalendarService {
    backend: Box<dyn CalendarBackend>,
    rules: SchedulingRules,
    log_book: Arc<ApiLogBook>,
}

impl CalendarService {
    pub fn new(
        backend: Box<dyn CalendarBackend>,
        rules: SchedulingRules,
        log_book: Arc<ApiLogBook>,
    ) -> Self {
        Self {
            backend,
            rules,
            log_book,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn find_available_slots(
        &self,
        date: NaiveDate,
        attendees: &[String],
        duration_minutes: u32,
    ) -> Result<Vec<TimeSlot>, CalendarError> {
        let busy = self.backend.busy_intervals(date, attendees).await?;
        let slots = free_slots(&self.rules, date, &busy, duration_minutes);
        self.log_book.record(
            LogChannel::Calendar,
            format!(
                "{}: {} busy intervals, {} free slots on {} for {} attendees",
                self.backend.name(),
                busy.len(),
                slots.len(),
                date,
                attendees.len()
            ),
        );
        Ok(slots)
    }

    /// Re-checks a single slot right before booking it.
    pub async fn is_slot_free(
        &self,
        date: NaiveDate,
        slot: &TimeSlot,
        attendees: &[String],
    ) -> Result<bool, CalendarError> {
        let busy = self.backend.busy_intervals(date, attendees).await?;
        let start = date.and_time(slot.start);
        let end = date.and_time(slot.end);
        let buffer = Duration::minutes(self.rules.buffer_minutes.max(0));
        Ok(!busy
            .iter()
            .any(|b| b.start < end + buffer && b.end > start - buffer))
    }

    pub async fn schedules(
        &self,
        date: NaiveDate,
        attendees: &[String],
    ) -> Result<Vec<AttendeeSchedule>, CalendarError> {
        let mut schedules = Vec::with_capacity(attendees.len());
        for attendee in attendees {
            let mut events = self.backend.events_for(date, attendee).await?;
            events.sort_by_key(|e| e.start);
            schedules.push(AttendeeSchedule {
                attendee: attendee.clone(),
                events: events
                    .into_iter()
                    .map(|e| ScheduledItem {
                        title: e.title,
                        start: e.start.time(),
                        end: e.end.time(),
                    })
                    .collect(),
            });
        }
        self.log_book.record(
            LogChannel::Calendar,
            format!("{}: fetched schedules for {} attendees on {}", self.backend.name(), attendees.len(), date),
        );
        Ok(schedules)
    }

    pub async fn create_event(&self, event: &CalendarEvent) -> Result<String, CalendarError> {
        let id = self.backend.create_event(event).await?;
        tracing::info!(event_id = %id, title = %event.title, "Created calendar event");
        self.log_book.record(
            LogChannel::Calendar,
            format!("{}: created event '{}' at {}", self.backend.name(), event.title, event.start),
        );
        Ok(id)
    }
}
