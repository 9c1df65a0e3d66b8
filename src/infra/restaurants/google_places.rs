use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::request_error;
use crate::core::restaurants::{
    GeoPoint, ProviderError, ProviderKind, ProviderQuery, RestaurantProvider, RestaurantRecord,
};

const NEARBY_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

/// Google Places Nearby Search.
pub struct GooglePlaces {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<ApiPlace>,
}

#[derive(Debug, Deserialize)]
struct ApiPlace {
    name: Option<String>,
    vicinity: Option<String>,
    formatted_address: Option<String>,
    rating: Option<f32>,
    user_ratings_total: Option<u32>,
    price_level: Option<u8>,
    #[serde(default)]
    types: Vec<String>,
    geometry: Option<ApiGeometry>,
}

#[derive(Debug, Deserialize)]
struct ApiGeometry {
    location: ApiLatLng,
}

#[derive(Debug, Deserialize)]
struct ApiLatLng {
    lat: f64,
    lng: f64,
}

impl GooglePlaces {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn parse(response: NearbyResponse) -> Result<Vec<RestaurantRecord>, ProviderError> {
        match response.status.as_str() {
            "OK" | "ZERO_RESULTS" => {}
            other => {
                let detail = response
                    .error_message
                    .map(|m| format!("{}: {}", other, m))
                    .unwrap_or_else(|| other.to_string());
                return Err(ProviderError::Rejected(detail));
            }
        }

        Ok(response.results.into_iter().filter_map(Self::map_place).collect())
    }

    fn map_place(place: ApiPlace) -> Option<RestaurantRecord> {
        let name = place.name.filter(|n| !n.trim().is_empty())?;
        let address = place
            .vicinity
            .or(place.formatted_address)
            .unwrap_or_default();

        let mut record = RestaurantRecord::new(name, address, ProviderKind::GooglePlaces);
        record.rating = place.rating;
        record.review_count = place.user_ratings_total;
        record.price_level = place.price_level;
        record.coordinates = place.geometry.map(|g| GeoPoint {
            latitude: g.location.lat,
            longitude: g.location.lng,
        });
        // Types like "indian_restaurant" are the only cuisine hint Nearby Search gives.
        record.cuisines = place
            .types
            .iter()
            .filter_map(|t| t.strip_suffix("_restaurant"))
            .map(|c| c.replace('_', " "))
            .collect();
        Some(record)
    }
}

#[async_trait]
impl RestaurantProvider for GooglePlaces {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GooglePlaces
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<RestaurantRecord>, ProviderError> {
        let location = format!("{},{}", query.latitude, query.longitude);
        let radius = query.radius_meters.to_string();
        let mut params = vec![
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("type", "restaurant"),
            ("key", self.api_key.as_str()),
        ];
        let keyword = query.keyword();
        if let Some(keyword) = keyword.as_deref() {
            params.push(("keyword", keyword));
        }

        let resp = self
            .client
            .get(NEARBY_SEARCH_URL)
            .query(&params)
            .send()
            .await
            .map_err(request_error)?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status().as_u16()));
        }

        let body: NearbyResponse = resp.json().await.map_err(request_error)?;
        Self::parse(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nearby_results() {
        let body: NearbyResponse = serde_json::from_str(
            r#"{"status":"OK","results":[
                {"name":"Paradise","vicinity":"Gachibowli","rating":4.3,"user_ratings_total":5120,
                 "price_level":2,"types":["indian_restaurant","restaurant","food"],
                 "geometry":{"location":{"lat":17.44,"lng":78.35}}},
                {"vicinity":"nameless"}
            ]}"#,
        )
        .unwrap();

        let records = GooglePlaces::parse(body).unwrap();
        assert_eq!(records.len(), 1);
        let paradise = &records[0];
        assert_eq!(paradise.address, "Gachibowli");
        assert_eq!(paradise.rating, Some(4.3));
        assert_eq!(paradise.review_count, Some(5120));
        assert!(paradise.cuisines.contains("indian"));
        assert_eq!(paradise.source, ProviderKind::GooglePlaces);
    }

    #[test]
    fn test_zero_results_is_empty_not_error() {
        let body: NearbyResponse = serde_json::from_str(r#"{"status":"ZERO_RESULTS","results":[]}"#).unwrap();
        assert!(GooglePlaces::parse(body).unwrap().is_empty());
    }

    #[test]
    fn test_denied_status_is_rejected() {
        let body: NearbyResponse = serde_json::from_str(
            r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid."}"#,
        )
        .unwrap();
        match GooglePlaces::parse(body) {
            Err(ProviderError::Rejected(detail)) => assert!(detail.starts_with("REQUEST_DENIED")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
