use crate::core::calendar::AttendeeSchedule;
use crate::core::sessions::SelectionOption;
use serde::{Deserialize, Serialize};

/// What the client should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    SelectTimeSlot,
    SelectRestaurant,
    DisplaySchedules,
    InputMissingFields,
    Complete,
}

/// The response shape of every assistant operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectionOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Vec<AttendeeSchedule>>,
}

impl ResultEnvelope {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            next_action: None,
            options: None,
            missing_fields: None,
            schedules: None,
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            success: true,
            next_action: Some(NextAction::Complete),
            ..Self::failure(message)
        }
    }

    pub fn selection(
        message: impl Into<String>,
        next_action: NextAction,
        options: Vec<SelectionOption>,
    ) -> Self {
        Self {
            success: true,
            next_action: Some(next_action),
            options: Some(options),
            ..Self::failure(message)
        }
    }

    pub fn missing_fields(message: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            next_action: Some(NextAction::InputMissingFields),
            missing_fields: Some(fields),
            ..Self::failure(message)
        }
    }

    pub fn schedules(message: impl Into<String>, schedules: Vec<AttendeeSchedule>) -> Self {
        Self {
            success: true,
            next_action: Some(NextAction::DisplaySchedules),
            schedules: Some(schedules),
            ..Self::failure(message)
        }
    }
}
