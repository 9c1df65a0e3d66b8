use super::restaurant_models::{
    normalize_text, ProviderQuery, ProviderReport, RestaurantRecord, SearchOutcome,
    SearchPreferences,
};
use super::restaurant_provider::{ProviderError, RestaurantProvider};
use crate::core::api_logs::{ApiLogBook, LogChannel};
use crate::core::location::ResolvedLocation;
use futures_util::future::join_all;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestaurantError {
    /// `reachable_providers` counts providers that returned at least one record.
    /// Zero means nothing came back at all; more than zero means every result
    /// was filtered out.
    #[error("No restaurants found ({reachable_providers} providers returned results, {failed_providers} failed)")]
    NoRestaurantsFound {
        reachable_providers: usize,
        failed_providers: usize,
    },
}

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub radius_meters: u32,
    pub max_results: usize,
    pub provider_timeout: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            radius_meters: 5000,
            max_results: 20,
            provider_timeout: Duration::from_secs(10),
        }
    }
}

/// A record tagged with the position of the provider that produced it.
struct Candidate {
    rank: usize,
    authoritative: bool,
    record: RestaurantRecord,
}

/// Fans a search out to every configured provider and reduces the answers
/// into one ranked list. Provider order is merge priority.
pub struct RestaurantAggregator {
    providers: Vec<Box<dyn RestaurantProvider>>,
    settings: AggregatorSettings,
    log_book: Arc<ApiLogBook>,
}

impl RestaurantAggregator {
    pub fn new(
        providers: Vec<Box<dyn RestaurantProvider>>,
        settings: AggregatorSettings,
        log_book: Arc<ApiLogBook>,
    ) -> Self {
        Self {
            providers,
            settings,
            log_book,
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn providers(&self) -> impl Iterator<Item = &dyn RestaurantProvider> {
        self.providers.iter().map(|p| p.as_ref())
    }

    pub fn radius_meters(&self) -> u32 {
        self.settings.radius_meters
    }

    pub async fn search(
        &self,
        coords: &ResolvedLocation,
        query_terms: &[String],
        preferences: &SearchPreferences,
    ) -> Result<SearchOutcome, RestaurantError> {
        let query = ProviderQuery {
            latitude: coords.latitude,
            longitude: coords.longitude,
            radius_meters: self.settings.radius_meters,
            terms: query_terms.to_vec(),
        };

        let timeout = self.settings.provider_timeout;
        let calls = self.providers.iter().map(|provider| {
            let query = &query;
            async move {
                match tokio::time::timeout(timeout, provider.search(query)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout),
                }
            }
        });

        // join_all yields results in provider order regardless of completion order.
        let results = join_all(calls).await;

        let mut reports = Vec::with_capacity(results.len());
        let mut candidates = Vec::new();
        for (rank, (provider, result)) in self.providers.iter().zip(results).enumerate() {
            match result {
                Ok(records) => {
                    tracing::info!(
                        provider = provider.kind().label(),
                        count = records.len(),
                        "Restaurant provider returned results"
                    );
                    self.log_book.record(
                        LogChannel::Restaurant,
                        format!("{}: {} results", provider.kind().label(), records.len()),
                    );
                    reports.push(ProviderReport {
                        provider: provider.kind(),
                        records: records.len(),
                        error: None,
                    });
                    candidates.extend(records.into_iter().map(|record| Candidate {
                        rank,
                        authoritative: provider.authoritative_for_menus(),
                        record,
                    }));
                }
                Err(e) => {
                    tracing::warn!("Restaurant provider {} failed: {}", provider.kind().label(), e);
                    self.log_book.record(
                        LogChannel::Restaurant,
                        format!("{}: error: {}", provider.kind().label(), e),
                    );
                    reports.push(ProviderReport {
                        provider: provider.kind(),
                        records: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let mut restaurants: Vec<RestaurantRecord> = merge_candidates(candidates)
            .into_iter()
            .filter(|record| preferences.accepts(record))
            .collect();
        restaurants.sort_by(rank_order);
        restaurants.truncate(self.settings.max_results);

        if restaurants.is_empty() {
            return Err(RestaurantError::NoRestaurantsFound {
                reachable_providers: reports.iter().filter(|r| r.records > 0).count(),
                failed_providers: reports.iter().filter(|r| r.error.is_some()).count(),
            });
        }

        Ok(SearchOutcome {
            restaurants,
            reports,
        })
    }
}

fn merge_candidates(candidates: Vec<Candidate>) -> Vec<RestaurantRecord> {
    let mut groups: BTreeMap<(String, String), Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        if candidate.record.name.trim().is_empty() {
            continue;
        }
        groups
            .entry(candidate.record.identity())
            .or_default()
            .push(candidate);
    }

    groups
        .into_values()
        .map(|mut group| {
            // Stable sort keeps each provider's own order for same-rank duplicates.
            group.sort_by_key(|c| c.rank);
            merge_group(group)
        })
        .collect()
}

fn merge_group(group: Vec<Candidate>) -> RestaurantRecord {
    let first = &group[0].record;
    let mut merged = RestaurantRecord::new(first.name.clone(), first.address.clone(), first.source);

    if merged.address.trim().is_empty() {
        if let Some(address) = group
            .iter()
            .map(|c| &c.record.address)
            .find(|a| !a.trim().is_empty())
        {
            merged.address = address.clone();
        }
    }

    // Rating: the one backed by the most reviews, then provider priority.
    // Its review count travels with it.
    let rated = group
        .iter()
        .filter(|c| c.record.rating.is_some())
        .max_by(|a, b| {
            a.record
                .review_count
                .unwrap_or(0)
                .cmp(&b.record.review_count.unwrap_or(0))
                .then_with(|| b.rank.cmp(&a.rank))
        });
    match rated {
        Some(winner) => {
            merged.rating = winner.record.rating;
            merged.review_count = winner.record.review_count;
        }
        None => merged.review_count = group.iter().find_map(|c| c.record.review_count),
    }

    merged.price_level = group.iter().find_map(|c| c.record.price_level);
    merged.phone = group.iter().find_map(|c| c.record.phone.clone());
    merged.website = group.iter().find_map(|c| c.record.website.clone());
    merged.coordinates = group.iter().find_map(|c| c.record.coordinates);

    let authority = group
        .iter()
        .find(|c| c.authoritative && !c.record.cuisines.is_empty());
    merged.cuisines = match authority {
        Some(candidate) => candidate.record.cuisines.clone(),
        None => group
            .iter()
            .flat_map(|c| c.record.cuisines.iter().cloned())
            .collect::<BTreeSet<_>>(),
    };

    if let Some(candidate) = group.iter().find(|c| c.authoritative) {
        merged.source = candidate.record.source;
    }

    merged
}

/// Rating descending with unrated records last, then completeness, then name.
fn rank_order(a: &RestaurantRecord, b: &RestaurantRecord) -> Ordering {
    let by_rating = match (a.rating, b.rating) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_rating
        .then_with(|| b.completeness().cmp(&a.completeness()))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| normalize_text(&a.address).cmp(&normalize_text(&b.address)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::restaurants::ProviderKind;
    use async_trait::async_trait;

    struct FakeProvider {
        kind: ProviderKind,
        authoritative: bool,
        delay: Duration,
        records: Vec<RestaurantRecord>,
        fail: bool,
    }

    impl FakeProvider {
        fn returning(kind: ProviderKind, records: Vec<RestaurantRecord>) -> Self {
            Self {
                kind,
                authoritative: false,
                delay: Duration::from_millis(0),
                records,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl RestaurantProvider for FakeProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn authoritative_for_menus(&self) -> bool {
            self.authoritative
        }

        async fn search(&self, _query: &ProviderQuery) -> Result<Vec<RestaurantRecord>, ProviderError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ProviderError::Status(503));
            }
            Ok(self.records.clone())
        }
    }

    fn here() -> ResolvedLocation {
        ResolvedLocation {
            latitude: 17.385,
            longitude: 78.4867,
            display_name: "Hyderabad".to_string(),
        }
    }

    fn record(kind: ProviderKind, name: &str, address: &str, rating: Option<f32>) -> RestaurantRecord {
        let mut r = RestaurantRecord::new(name, address, kind);
        r.rating = rating;
        r
    }

    fn aggregator(providers: Vec<Box<dyn RestaurantProvider>>) -> RestaurantAggregator {
        RestaurantAggregator::new(
            providers,
            AggregatorSettings {
                provider_timeout: Duration::from_millis(200),
                ..AggregatorSettings::default()
            },
            Arc::new(ApiLogBook::new()),
        )
    }

    #[tokio::test]
    async fn test_duplicates_merge_into_one_record() {
        let mut google = record(ProviderKind::GooglePlaces, "Paradise Biryani", "MG Road, Secunderabad", Some(4.3));
        google.review_count = Some(1200);
        let mut geoapify = record(ProviderKind::Geoapify, "paradise biryani", "MG Road Secunderabad", None);
        geoapify.phone = Some("+91 40 1234 5678".to_string());
        geoapify.cuisines.insert("hyderabadi".to_string());

        let service = aggregator(vec![
            Box::new(FakeProvider::returning(ProviderKind::GooglePlaces, vec![google])),
            Box::new(FakeProvider {
                authoritative: true,
                ..FakeProvider::returning(ProviderKind::Geoapify, vec![geoapify])
            }),
        ]);

        let outcome = service
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap();

        assert_eq!(outcome.restaurants.len(), 1);
        let merged = &outcome.restaurants[0];
        assert_eq!(merged.name, "Paradise Biryani");
        assert_eq!(merged.rating, Some(4.3));
        assert_eq!(merged.review_count, Some(1200));
        assert_eq!(merged.phone.as_deref(), Some("+91 40 1234 5678"));
        assert!(merged.cuisines.contains("hyderabadi"));
        assert_eq!(merged.source, ProviderKind::Geoapify);
    }

    #[tokio::test]
    async fn test_rating_with_more_reviews_wins() {
        let mut google = record(ProviderKind::GooglePlaces, "Bawarchi", "RTC X Roads", Some(4.0));
        google.review_count = Some(40);
        let mut other = record(ProviderKind::Geoapify, "Bawarchi", "RTC X Roads", Some(4.6));
        other.review_count = Some(900);

        let service = aggregator(vec![
            Box::new(FakeProvider::returning(ProviderKind::GooglePlaces, vec![google])),
            Box::new(FakeProvider::returning(ProviderKind::Geoapify, vec![other])),
        ]);

        let outcome = service
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap();
        assert_eq!(outcome.restaurants[0].rating, Some(4.6));
        assert_eq!(outcome.restaurants[0].review_count, Some(900));
    }

    #[tokio::test]
    async fn test_menu_authority_cuisines_replace_the_union() {
        let mut google = record(ProviderKind::GooglePlaces, "Chutneys", "Banjara Hills", Some(4.2));
        google.cuisines.insert("indian".to_string());
        google.cuisines.insert("vegetarian".to_string());
        let mut geoapify = record(ProviderKind::Geoapify, "Chutneys", "Banjara Hills", None);
        geoapify.cuisines.insert("south indian".to_string());

        let service = aggregator(vec![
            Box::new(FakeProvider::returning(ProviderKind::GooglePlaces, vec![google])),
            Box::new(FakeProvider {
                authoritative: true,
                ..FakeProvider::returning(ProviderKind::Geoapify, vec![geoapify])
            }),
        ]);

        let outcome = service
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap();
        let cuisines: Vec<&str> = outcome.restaurants[0].cuisines.iter().map(String::as_str).collect();
        assert_eq!(cuisines, vec!["south indian"]);
    }

    #[tokio::test]
    async fn test_min_rating_filter_is_fail_open() {
        let service = aggregator(vec![Box::new(FakeProvider::returning(
            ProviderKind::GooglePlaces,
            vec![
                record(ProviderKind::GooglePlaces, "Good", "1", Some(4.5)),
                record(ProviderKind::GooglePlaces, "Poor", "2", Some(2.9)),
                record(ProviderKind::GooglePlaces, "Unrated", "3", None),
            ],
        ))]);

        let prefs = SearchPreferences {
            min_rating: Some(3.5),
            ..SearchPreferences::default()
        };
        let outcome = service.search(&here(), &[], &prefs).await.unwrap();

        let names: Vec<&str> = outcome.restaurants.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Good", "Unrated"]);
        assert!(outcome
            .restaurants
            .iter()
            .all(|r| r.rating.map_or(true, |rating| rating >= 3.5)));
    }

    #[tokio::test]
    async fn test_order_is_deterministic_across_completion_order() {
        let google_records = vec![
            record(ProviderKind::GooglePlaces, "Chutneys", "Banjara Hills", Some(4.2)),
            record(ProviderKind::GooglePlaces, "Ohri's", "Basheerbagh", Some(4.2)),
        ];
        let geo_records = vec![
            record(ProviderKind::Geoapify, "Absolute Barbecues", "Gachibowli", Some(4.7)),
            record(ProviderKind::Geoapify, "Cafe Niloufer", "Lakdikapul", None),
        ];

        let fast_google = aggregator(vec![
            Box::new(FakeProvider::returning(ProviderKind::GooglePlaces, google_records.clone())),
            Box::new(FakeProvider {
                delay: Duration::from_millis(30),
                ..FakeProvider::returning(ProviderKind::Geoapify, geo_records.clone())
            }),
        ]);
        let slow_google = aggregator(vec![
            Box::new(FakeProvider {
                delay: Duration::from_millis(30),
                ..FakeProvider::returning(ProviderKind::GooglePlaces, google_records)
            }),
            Box::new(FakeProvider::returning(ProviderKind::Geoapify, geo_records)),
        ]);

        let a = fast_google
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap();
        let b = slow_google
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap();

        assert_eq!(a.restaurants, b.restaurants);
        let names: Vec<&str> = a.restaurants.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Absolute Barbecues", "Chutneys", "Ohri's", "Cafe Niloufer"]
        );
    }

    #[tokio::test]
    async fn test_failed_and_slow_providers_do_not_fail_the_search() {
        let service = aggregator(vec![
            Box::new(FakeProvider {
                fail: true,
                ..FakeProvider::returning(ProviderKind::GooglePlaces, vec![])
            }),
            Box::new(FakeProvider {
                delay: Duration::from_secs(5),
                ..FakeProvider::returning(
                    ProviderKind::OpenTripMap,
                    vec![record(ProviderKind::OpenTripMap, "Too Late", "X", None)],
                )
            }),
            Box::new(FakeProvider::returning(
                ProviderKind::Geoapify,
                vec![record(ProviderKind::Geoapify, "On Time", "Y", Some(4.0))],
            )),
        ]);

        let outcome = service
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap();

        assert_eq!(outcome.restaurants.len(), 1);
        assert_eq!(outcome.restaurants[0].name, "On Time");
        assert_eq!(outcome.reports.iter().filter(|r| r.error.is_some()).count(), 2);
    }

    #[tokio::test]
    async fn test_all_empty_reports_no_restaurants_found() {
        let service = aggregator(vec![
            Box::new(FakeProvider::returning(ProviderKind::GooglePlaces, vec![])),
            Box::new(FakeProvider::returning(ProviderKind::Geoapify, vec![])),
        ]);

        let err = service
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap_err();

        match err {
            RestaurantError::NoRestaurantsFound {
                reachable_providers,
                failed_providers,
            } => {
                assert_eq!(reachable_providers, 0);
                assert_eq!(failed_providers, 0);
            }
        }
    }

    #[tokio::test]
    async fn test_unreachable_providers_are_counted_as_failed() {
        let service = aggregator(vec![
            Box::new(FakeProvider {
                fail: true,
                ..FakeProvider::returning(ProviderKind::GooglePlaces, vec![])
            }),
            Box::new(FakeProvider {
                delay: Duration::from_secs(5),
                ..FakeProvider::returning(
                    ProviderKind::Geoapify,
                    vec![record(ProviderKind::Geoapify, "Too Late", "X", Some(4.0))],
                )
            }),
        ]);

        let err = service
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap_err();

        match err {
            RestaurantError::NoRestaurantsFound {
                reachable_providers,
                failed_providers,
            } => {
                assert_eq!(reachable_providers, 0);
                assert_eq!(failed_providers, 2);
            }
        }
    }

    #[tokio::test]
    async fn test_everything_filtered_out_is_still_reachable() {
        let service = aggregator(vec![Box::new(FakeProvider::returning(
            ProviderKind::GooglePlaces,
            vec![
                record(ProviderKind::GooglePlaces, "Poor", "1", Some(2.9)),
                record(ProviderKind::GooglePlaces, "Worse", "2", Some(1.5)),
            ],
        ))]);

        let prefs = SearchPreferences {
            min_rating: Some(4.0),
            ..SearchPreferences::default()
        };
        let err = service.search(&here(), &[], &prefs).await.unwrap_err();

        match err {
            RestaurantError::NoRestaurantsFound {
                reachable_providers,
                failed_providers,
            } => {
                assert_eq!(reachable_providers, 1);
                assert_eq!(failed_providers, 0);
            }
        }
    }

    #[tokio::test]
    async fn test_results_are_truncated() {
        let records: Vec<_> = (0..30)
            .map(|i| record(ProviderKind::GooglePlaces, &format!("Place {:02}", i), "Road", Some(4.0)))
            .collect();
        let service = RestaurantAggregator::new(
            vec![Box::new(FakeProvider::returning(ProviderKind::GooglePlaces, records))],
            AggregatorSettings {
                max_results: 12,
                ..AggregatorSettings::default()
            },
            Arc::new(ApiLogBook::new()),
        );

        let outcome = service
            .search(&here(), &[], &SearchPreferences::default())
            .await
            .unwrap();
        assert_eq!(outcome.restaurants.len(), 12);
        assert_eq!(outcome.restaurants[0].name, "Place 00");
    }
}
