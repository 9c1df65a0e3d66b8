use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where a restaurant record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    GooglePlaces,
    Geoapify,
    OpenTripMap,
}

impl ProviderKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::GooglePlaces => "Google Places",
            ProviderKind::Geoapify => "Geoapify",
            ProviderKind::OpenTripMap => "OpenTripMap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// One restaurant in the shape every provider is normalized into.
///
/// `rating` is `None` when the provider has no rating data; it is never
/// treated as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantRecord {
    pub name: String,
    pub address: String,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub price_level: Option<u8>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub source: ProviderKind,
    pub cuisines: BTreeSet<String>,
    pub coordinates: Option<GeoPoint>,
}

impl RestaurantRecord {
    pub fn new(name: impl Into<String>, address: impl Into<String>, source: ProviderKind) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            rating: None,
            review_count: None,
            price_level: None,
            phone: None,
            website: None,
            source,
            cuisines: BTreeSet::new(),
            coordinates: None,
        }
    }

    /// Cross-provider identity: normalized (name, address).
    pub fn identity(&self) -> (String, String) {
        (normalize_text(&self.name), normalize_text(&self.address))
    }

    /// Number of populated optional attributes.
    pub fn completeness(&self) -> usize {
        [
            self.rating.is_some(),
            self.review_count.is_some(),
            self.price_level.is_some(),
            self.phone.is_some(),
            self.website.is_some(),
            self.coordinates.is_some(),
            !self.cuisines.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// Lowercases and collapses every run of non-alphanumeric characters into a
/// single space.
pub fn normalize_text(value: &str) -> String {
    value
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// User preferences applied after merging.
///
/// Filtering is fail-open: a record that lacks the filtered attribute is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPreferences {
    pub min_rating: Option<f32>,
    pub max_price_level: Option<u8>,
    pub cuisine: Option<String>,
}

impl SearchPreferences {
    pub fn accepts(&self, record: &RestaurantRecord) -> bool {
        if let (Some(min), Some(rating)) = (self.min_rating, record.rating) {
            if rating < min {
                return false;
            }
        }

        if let (Some(max), Some(price)) = (self.max_price_level, record.price_level) {
            if price > max {
                return false;
            }
        }

        if let Some(wanted) = self.cuisine.as_deref().map(normalize_text) {
            if !wanted.is_empty() && !record.cuisines.is_empty() {
                let matches = record
                    .cuisines
                    .iter()
                    .any(|c| normalize_text(c).contains(&wanted))
                    || normalize_text(&record.name).contains(&wanted);
                if !matches {
                    return false;
                }
            }
        }

        true
    }
}

/// What is sent to each provider.
#[derive(Debug, Clone)]
pub struct ProviderQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: u32,
    pub terms: Vec<String>,
}

impl ProviderQuery {
    pub fn keyword(&self) -> Option<String> {
        let joined = self.terms.join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Per-provider outcome of one search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderReport {
    pub provider: ProviderKind,
    pub records: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub restaurants: Vec<RestaurantRecord>,
    pub reports: Vec<ProviderReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_collapses_punctuation() {
        assert_eq!(normalize_text("  Paradise  Biryani!! "), "paradise biryani");
        assert_eq!(
            normalize_text("Road No. 36, Jubilee Hills"),
            "road no 36 jubilee hills"
        );
    }

    #[test]
    fn test_preferences_fail_open_on_missing_attributes() {
        let prefs = SearchPreferences {
            min_rating: Some(4.0),
            max_price_level: Some(2),
            cuisine: Some("Italian".to_string()),
        };

        let unknown = RestaurantRecord::new("Mystery Diner", "Somewhere", ProviderKind::OpenTripMap);
        assert!(prefs.accepts(&unknown));

        let mut low = RestaurantRecord::new("Low", "A", ProviderKind::GooglePlaces);
        low.rating = Some(3.2);
        assert!(!prefs.accepts(&low));

        let mut pricey = RestaurantRecord::new("Pricey", "B", ProviderKind::GooglePlaces);
        pricey.price_level = Some(4);
        assert!(!prefs.accepts(&pricey));

        let mut wrong_cuisine = RestaurantRecord::new("Dragon", "C", ProviderKind::Geoapify);
        wrong_cuisine.cuisines.insert("chinese".to_string());
        assert!(!prefs.accepts(&wrong_cuisine));

        let mut right_cuisine = RestaurantRecord::new("Roma", "D", ProviderKind::Geoapify);
        right_cuisine.cuisines.insert("italian".to_string());
        right_cuisine.rating = Some(4.5);
        assert!(prefs.accepts(&right_cuisine));
    }
}
