// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "api_logs/api_log_book.rs"]
pub mod api_logs;

#[path = "assistant/mod.rs"]
pub mod assistant;

#[path = "calendar/calendar_service.rs"]
pub mod calendar;

#[path = "contacts/team_directory.rs"]
pub mod contacts;

#[path = "email/email_service.rs"]
pub mod email;

#[path = "location/location_service.rs"]
pub mod location;

#[path = "restaurants/mod.rs"]
pub mod restaurants;

#[path = "sessions/mod.rs"]
pub mod sessions;
