use crate::core::calendar::CalendarError;
use crate::core::email::EmailError;
use crate::core::location::LocationError;
use crate::core::restaurants::RestaurantError;
use crate::core::sessions::{SelectionError, SessionBusy};
use chrono::NaiveDate;
use thiserror::Error;

/// Every way an assistant operation can fail. The `Display` text is what the
/// user sees in the envelope message.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("I couldn't find the location '{place}'. Please check the spelling or try a nearby landmark.")]
    LocationNotFound { place: String, reason: String },
    #[error("{}", no_restaurants_message(*reachable_providers, *failed_providers))]
    NoRestaurantsFound {
        reachable_providers: usize,
        failed_providers: usize,
    },
    #[error("Invalid selection: {0}")]
    InvalidSelection(#[from] SelectionError),
    #[error("{0}. Please wait for the current request to finish.")]
    SessionBusy(#[from] SessionBusy),
    #[error("Please provide the following: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("I couldn't work out what you'd like to do. Try something like 'Setup a meeting with Nidhi tomorrow' or 'Find Italian restaurants in Gachibowli'.")]
    UnknownGoal,
    #[error("No free time slots on {0} for everyone. Try another date or a shorter duration.")]
    NoAvailableSlots(NaiveDate),
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),
    #[error("Email error: {0}")]
    Email(#[from] EmailError),
}

fn no_restaurants_message(reachable: usize, failed: usize) -> String {
    if reachable == 0 && failed > 0 {
        "No restaurants found: the restaurant services could not be reached. Please try again later."
            .to_string()
    } else if reachable == 0 {
        "No restaurants found near that location. Try a wider area or a different cuisine."
            .to_string()
    } else {
        "No restaurants matched your preferences. Try relaxing the rating, price or cuisine."
            .to_string()
    }
}

impl From<LocationError> for AssistantError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::LocationNotFound { place, reason } => {
                AssistantError::LocationNotFound { place, reason }
            }
            LocationError::Api(reason) => AssistantError::LocationNotFound {
                place: String::new(),
                reason,
            },
        }
    }
}

impl From<RestaurantError> for AssistantError {
    fn from(e: RestaurantError) -> Self {
        match e {
            RestaurantError::NoRestaurantsFound {
                reachable_providers,
                failed_providers,
            } => AssistantError::NoRestaurantsFound {
                reachable_providers,
                failed_providers,
            },
        }
    }
}
