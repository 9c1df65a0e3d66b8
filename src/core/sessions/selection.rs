use crate::core::calendar::TimeSlot;
use crate::core::contacts::TeamMember;
use crate::core::restaurants::RestaurantRecord;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionKind {
    #[serde(rename = "time-slot", alias = "time_slot", alias = "timeslot")]
    TimeSlot,
    #[serde(rename = "restaurant")]
    Restaurant,
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKind::TimeSlot => write!(f, "time-slot"),
            SelectionKind::Restaurant => write!(f, "restaurant"),
        }
    }
}

/// One choice offered to the user. `id` is the 0-based index to confirm.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionOption {
    TimeSlot {
        id: usize,
        time: String,
        #[serde(flatten)]
        slot: TimeSlot,
    },
    Restaurant {
        id: usize,
        #[serde(flatten)]
        restaurant: RestaurantRecord,
    },
}

impl SelectionOption {
    pub fn time_slot(id: usize, slot: TimeSlot) -> Self {
        SelectionOption::TimeSlot {
            id,
            time: slot.label(),
            slot,
        }
    }

    pub fn restaurant(id: usize, restaurant: RestaurantRecord) -> Self {
        SelectionOption::Restaurant { id, restaurant }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeetingPlan {
    pub title: String,
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub location: Option<String>,
    pub attendees: Vec<TeamMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DinnerPlan {
    pub area: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub cuisine: Option<String>,
    pub attendees: Vec<TeamMember>,
}

/// The side effect a confirmed option triggers.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Meeting(MeetingPlan),
    Dinner(DinnerPlan),
}

/// Options shown to the user and held until one is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSelection {
    pub kind: SelectionKind,
    pub options: Vec<SelectionOption>,
    pub origin_query: String,
    pub action: PendingAction,
    pub created_at: DateTime<Utc>,
}

impl PendingSelection {
    pub fn new(
        kind: SelectionKind,
        options: Vec<SelectionOption>,
        origin_query: impl Into<String>,
        action: PendingAction,
    ) -> Self {
        Self {
            kind,
            options,
            origin_query: origin_query.into(),
            action,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("there is no pending {0} selection to confirm")]
    NothingPending(SelectionKind),
    #[error("the pending selection is a {pending} choice, not {requested}")]
    KindMismatch {
        pending: SelectionKind,
        requested: SelectionKind,
    },
    #[error("option {index} does not exist ({available} options available)")]
    OutOfRange { index: i64, available: usize },
}
