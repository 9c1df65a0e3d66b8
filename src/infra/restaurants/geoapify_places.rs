use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::request_error;
use crate::core::restaurants::{
    GeoPoint, ProviderError, ProviderKind, ProviderQuery, RestaurantProvider, RestaurantRecord,
};

const PLACES_URL: &str = "https://api.geoapify.com/v2/places";

/// Geoapify Places. Its OpenStreetMap-derived cuisine tags are the most
/// reliable menu data among the providers.
pub struct GeoapifyPlaces {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Properties {
    name: Option<String>,
    formatted: Option<String>,
    address_line2: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    website: Option<String>,
    catering: Option<Catering>,
    contact: Option<Contact>,
    datasource: Option<Datasource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Catering {
    cuisine: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Contact {
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Datasource {
    raw: Option<RawTags>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTags {
    cuisine: Option<String>,
    phone: Option<String>,
}

impl GeoapifyPlaces {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn map_feature(feature: Feature) -> Option<RestaurantRecord> {
        let props = feature.properties;
        let name = props.name.filter(|n| !n.trim().is_empty())?;
        let address = props
            .formatted
            .or(props.address_line2)
            .unwrap_or_default();
        let raw = props.datasource.and_then(|d| d.raw).unwrap_or_default();

        let mut record = RestaurantRecord::new(name, address, ProviderKind::Geoapify);
        record.website = props.website;
        record.phone = props.contact.and_then(|c| c.phone).or(raw.phone);
        record.coordinates = match (props.lat, props.lon) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };
        // OSM cuisine values are ';'-separated, e.g. "indian;regional".
        record.cuisines = props
            .catering
            .and_then(|c| c.cuisine)
            .or(raw.cuisine)
            .unwrap_or_default()
            .split(';')
            .map(|c| c.trim().replace('_', " ").to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        Some(record)
    }
}

#[async_trait]
impl RestaurantProvider for GeoapifyPlaces {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Geoapify
    }

    fn authoritative_for_menus(&self) -> bool {
        true
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<RestaurantRecord>, ProviderError> {
        // Geoapify circles are lon,lat,radius.
        let filter = format!(
            "circle:{},{},{}",
            query.longitude, query.latitude, query.radius_meters
        );

        let resp = self
            .client
            .get(PLACES_URL)
            .query(&[
                ("categories", "catering.restaurant"),
                ("filter", filter.as_str()),
                ("limit", "30"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status().as_u16()));
        }

        let body: PlacesResponse = resp.json().await.map_err(request_error)?;
        Ok(body.features.into_iter().filter_map(Self::map_feature).collect())
    }
}
