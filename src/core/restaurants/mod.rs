pub mod restaurant_models;
pub mod restaurant_provider;
pub mod restaurant_service;

pub use restaurant_models::{
    GeoPoint, ProviderKind, ProviderQuery, ProviderReport, RestaurantRecord, SearchOutcome,
    SearchPreferences,
};
pub use restaurant_provider::{ProviderError, RestaurantProvider};
pub use restaurant_service::{AggregatorSettings, RestaurantAggregator, RestaurantError};
