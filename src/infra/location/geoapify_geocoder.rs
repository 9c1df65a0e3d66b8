use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::core::location::{Geocoder, LocationError, ResolvedLocation};

/// Geoapify forward geocoding, used when a Geoapify key is configured.
pub struct GeoapifyGeocoder {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// GeoJSON order: longitude, latitude.
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    formatted: Option<String>,
}

impl GeoapifyGeocoder {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn first_location(collection: FeatureCollection, query: &str) -> Option<ResolvedLocation> {
        let feature = collection.features.into_iter().next()?;
        match feature.geometry.coordinates.as_slice() {
            [lon, lat, ..] => Some(ResolvedLocation {
                latitude: *lat,
                longitude: *lon,
                display_name: feature
                    .properties
                    .formatted
                    .unwrap_or_else(|| query.to_string()),
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl Geocoder for GeoapifyGeocoder {
    fn name(&self) -> &'static str {
        "geoapify"
    }

    async fn geocode(&self, place: &str) -> Result<Option<ResolvedLocation>, LocationError> {
        let resp = self
            .client
            .get("https://api.geoapify.com/v1/geocode/search")
            .query(&[("text", place), ("limit", "1"), ("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| LocationError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LocationError::Api(format!(
                "Geoapify geocoding returned {}",
                resp.status()
            )));
        }

        let collection: FeatureCollection = resp
            .json()
            .await
            .map_err(|e| LocationError::Api(e.to_string()))?;
        Ok(Self::first_location(collection, place))
    }
}
