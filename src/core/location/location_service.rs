use crate::core::api_logs::{ApiLogBook, LogChannel};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location not found: '{place}' ({reason})")]
    LocationNotFound { place: String, reason: String },
    #[error("Geocoding service error: {0}")]
    Api(String),
}

/// A place name resolved to coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

/// A forward geocoder. Returns the best match first, or `None` for zero matches.
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn geocode(&self, place: &str) -> Result<Option<ResolvedLocation>, LocationError>;
}

#[async_trait]
impl Geocoder for Box<dyn Geocoder> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn geocode(&self, place: &str) -> Result<Option<ResolvedLocation>, LocationError> {
        (**self).geocode(place).await
    }
}

/// Resolves free-text place names. Results are cached for the process lifetime.
pub struct LocationService<G: Geocoder> {
    geocoder: G,
    cache: DashMap<String, ResolvedLocation>,
    log_book: Arc<ApiLogBook>,
}

impl<G: Geocoder> LocationService<G> {
    pub fn new(geocoder: G, log_book: Arc<ApiLogBook>) -> Self {
        Self {
            geocoder,
            cache: DashMap::new(),
            log_book,
        }
    }

    pub fn geocoder_name(&self) -> &'static str {
        self.geocoder.name()
    }

    pub async fn resolve(&self, place: &str) -> Result<ResolvedLocation, LocationError> {
        let place = place.trim();
        if place.is_empty() {
            return Err(LocationError::LocationNotFound {
                place: String::new(),
                reason: "empty place name".to_string(),
            });
        }

        let key = place.to_lowercase();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        match self.geocoder.geocode(place).await {
            Ok(Some(location)) => {
                tracing::debug!(
                    place = place,
                    lat = location.latitude,
                    lon = location.longitude,
                    "Resolved location"
                );
                self.log_book.record(
                    LogChannel::Location,
                    format!(
                        "{}: '{}' -> {:.4}, {:.4}",
                        self.geocoder.name(),
                        place,
                        location.latitude,
                        location.longitude
                    ),
                );
                self.cache.insert(key, location.clone());
                Ok(location)
            }
            Ok(None) => {
                self.log_book.record(
                    LogChannel::Location,
                    format!("{}: '{}' -> no matches", self.geocoder.name(), place),
                );
                Err(LocationError::LocationNotFound {
                    place: place.to_string(),
                    reason: "no matches".to_string(),
                })
            }
            Err(e) => {
                tracing::warn!("Geocoding '{}' failed: {}", place, e);
                self.log_book.record(
                    LogChannel::Location,
                    format!("{}: '{}' -> error: {}", self.geocoder.name(), place, e),
                );
                Err(LocationError::LocationNotFound {
                    place: place.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeGeocoder {
        calls: Arc<AtomicUsize>,
        result: Option<ResolvedLocation>,
        fail: bool,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn geocode(&self, _place: &str) -> Result<Option<ResolvedLocation>, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LocationError::Api("connection refused".to_string()));
            }
            Ok(self.result.clone())
        }
    }

    fn service_with(geocoder: FakeGeocoder) -> LocationService<FakeGeocoder> {
        LocationService::new(geocoder, Arc::new(ApiLogBook::new()))
    }

    fn gachibowli() -> ResolvedLocation {
        ResolvedLocation {
            latitude: 17.44,
            longitude: 78.35,
            display_name: "Gachibowli, Hyderabad".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_caches_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service_with(FakeGeocoder {
            calls: calls.clone(),
            result: Some(gachibowli()),
            fail: false,
        });

        let first = service.resolve("  Gachibowli ").await.unwrap();
        let second = service.resolve("gachibowli").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_place_is_rejected_without_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service_with(FakeGeocoder {
            calls: calls.clone(),
            result: Some(gachibowli()),
            fail: false,
        });

        let err = service.resolve("   ").await.unwrap_err();
        assert!(matches!(err, LocationError::LocationNotFound { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_matches_and_errors_are_not_found() {
        let service = service_with(FakeGeocoder {
            calls: Arc::new(AtomicUsize::new(0)),
            result: None,
            fail: false,
        });
        assert!(matches!(
            service.resolve("Atlantis").await,
            Err(LocationError::LocationNotFound { .. })
        ));

        let failing = service_with(FakeGeocoder {
            calls: Arc::new(AtomicUsize::new(0)),
            result: None,
            fail: true,
        });
        match failing.resolve("Hyderabad").await {
            Err(LocationError::LocationNotFound { place, reason }) => {
                assert_eq!(place, "Hyderabad");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookups_are_written_to_the_location_log() {
        let log_book = Arc::new(ApiLogBook::new());
        let service = LocationService::new(
            FakeGeocoder {
                calls: Arc::new(AtomicUsize::new(0)),
                result: Some(gachibowli()),
                fail: false,
            },
            log_book.clone(),
        );

        service.resolve("Gachibowli").await.unwrap();
        service.resolve("gachibowli").await.unwrap();

        let lines = log_book.lines(LogChannel::Location);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("fake: 'Gachibowli' -> 17.4400, 78.3500"));
    }
}
