pub mod geoapify_geocoder;
pub mod nominatim_client;

pub use geoapify_geocoder::GeoapifyGeocoder;
pub use nominatim_client::NominatimClient;
