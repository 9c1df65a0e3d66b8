pub mod google_calendar;
pub mod sqlite_calendar;

pub use google_calendar::GoogleCalendarClient;
pub use sqlite_calendar::SqliteCalendar;
