use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::request_error;
use crate::core::restaurants::{
    GeoPoint, ProviderError, ProviderKind, ProviderQuery, RestaurantProvider, RestaurantRecord,
};

const RADIUS_URL: &str = "https://api.opentripmap.com/0.1/en/places/radius";

/// OpenTripMap radius search over the "foods" kind. Has names and
/// coordinates but no ratings, prices or street addresses.
pub struct OpenTripMap {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ApiPlace {
    #[serde(default)]
    name: String,
    #[serde(default)]
    kinds: String,
    point: Option<ApiPoint>,
}

#[derive(Debug, Deserialize)]
struct ApiPoint {
    lat: f64,
    lon: f64,
}

impl OpenTripMap {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn map_place(place: ApiPlace, terms: &[String]) -> Option<RestaurantRecord> {
        let name = place.name.trim();
        if name.is_empty() {
            return None;
        }

        // No server-side keyword filter, so requested terms are matched here.
        if !terms.is_empty() {
            let haystack = format!("{} {}", name, place.kinds).to_lowercase();
            if !terms.iter().any(|t| haystack.contains(&t.to_lowercase())) {
                return None;
            }
        }

        let mut record = RestaurantRecord::new(name, "", ProviderKind::OpenTripMap);
        record.coordinates = place.point.map(|p| GeoPoint {
            latitude: p.lat,
            longitude: p.lon,
        });
        Some(record)
    }
}

#[async_trait]
impl RestaurantProvider for OpenTripMap {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenTripMap
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<RestaurantRecord>, ProviderError> {
        let radius = query.radius_meters.to_string();
        let lat = query.latitude.to_string();
        let lon = query.longitude.to_string();

        let resp = self
            .client
            .get(RADIUS_URL)
            .query(&[
                ("radius", radius.as_str()),
                ("lon", lon.as_str()),
                ("lat", lat.as_str()),
                ("kinds", "foods"),
                ("format", "json"),
                ("limit", "20"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status().as_u16()));
        }

        let places: Vec<ApiPlace> = resp.json().await.map_err(request_error)?;
        Ok(places
            .into_iter()
            .filter_map(|p| Self::map_place(p, &query.terms))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn places() -> Vec<ApiPlace> {
        serde_json::from_str(
            r#"[
                {"xid":"N1","name":"Shah Ghouse Cafe","kinds":"foods,restaurants","rate":3,
                 "point":{"lon":78.47,"lat":17.36}},
                {"xid":"N2","name":"","kinds":"foods,cafes","point":{"lon":78.4,"lat":17.3}},
                {"xid":"N3","name":"Pizza Hut","kinds":"foods,fast_food","point":{"lon":78.4,"lat":17.3}}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_unnamed_places_are_skipped_and_rating_stays_unknown() {
        let records: Vec<_> = places()
            .into_iter()
            .filter_map(|p| OpenTripMap::map_place(p, &[]))
            .collect();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.rating.is_none()));
        assert_eq!(records[0].coordinates.map(|c| c.longitude), Some(78.47));
    }

    #[test]
    fn test_terms_filter_locally() {
        let terms = vec!["pizza".to_string()];
        let records: Vec<_> = places()
            .into_iter()
            .filter_map(|p| OpenTripMap::map_place(p, &terms))
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Pizza Hut");
    }
}
