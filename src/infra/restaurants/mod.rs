pub mod geoapify_places;
pub mod google_places;
pub mod opentripmap;

pub use geoapify_places::GeoapifyPlaces;
pub use google_places::GooglePlaces;
pub use opentripmap::OpenTripMap;

use crate::core::restaurants::ProviderError;

pub(crate) fn request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_decode() {
        ProviderError::Decode(e.to_string())
    } else {
        ProviderError::Http(e.to_string())
    }
}
