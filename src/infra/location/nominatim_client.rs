use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;

use crate::core::location::{Geocoder, LocationError, ResolvedLocation};

/// OpenStreetMap Nominatim geocoder. Needs no key but does require a
/// descriptive User-Agent.
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

impl NominatimClient {
    pub fn new() -> Result<Self, LocationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("NebulaAssistant/0.3 (team scheduling assistant)"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| LocationError::Api(e.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
        })
    }

    fn to_location(place: NominatimPlace, query: &str) -> Option<ResolvedLocation> {
        Some(ResolvedLocation {
            latitude: place.lat.parse().ok()?,
            longitude: place.lon.parse().ok()?,
            display_name: place.display_name.unwrap_or_else(|| query.to_string()),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, place: &str) -> Result<Option<ResolvedLocation>, LocationError> {
        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| LocationError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LocationError::Api(format!(
                "Nominatim returned {}",
                resp.status()
            )));
        }

        let places: Vec<NominatimPlace> = resp
            .json()
            .await
            .map_err(|e| LocationError::Api(e.to_string()))?;

        Ok(places
            .into_iter()
            .next()
            .and_then(|p| Self::to_location(p, place)))
    }
}
