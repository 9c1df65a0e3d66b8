// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "calendar/mod.rs"]
pub mod calendar;

#[path = "contacts/mod.rs"]
pub mod contacts;

#[path = "email/mod.rs"]
pub mod email;

#[path = "location/mod.rs"]
pub mod location;

#[path = "restaurants/mod.rs"]
pub mod restaurants;
