//! Query building and relaxed search.
//!
//! Turns a resolved [`Intent`] into an [`OfferQuery`] and runs it against the
//! catalog. When the literal query finds nothing, the ladder loosens one
//! constraint at a time: first the travel month, then the budget ceiling.

use std::time::Duration;

use tracing::{debug, warn};

use wayfarer_core::types::{DateWindow, Intent, Offer, OfferQuery, SortOrder, UsedRelaxations};

use crate::catalog::OfferCatalog;
use crate::error::with_timeout;

pub const DEFAULT_BUDGET_RELAX_FACTOR: f64 = 1.5;

/// Build the catalog predicate for an intent.
///
/// The search text is the destination, falling back to the country and then
/// the continent. The month window is only applied when both month and year
/// are known.
pub fn build_query(intent: &Intent, sort: SortOrder, limit: usize) -> OfferQuery {
    let text = intent
        .destination
        .clone()
        .or_else(|| intent.country.clone())
        .or_else(|| intent.continent.clone());

    let window = match (intent.year, intent.month) {
        (Some(year), Some(month)) => DateWindow::for_month(year, month),
        _ => None,
    };

    OfferQuery {
        text,
        price_min: intent.budget_min,
        price_max: intent.budget_max,
        window,
        max_duration_days: intent.duration_days,
        transport: intent.transport_type,
        accommodation: intent.accommodation_level,
        must_include: intent.must_include.clone(),
        sort,
        limit,
    }
}

/// Runs a query and its relaxation ladder.
#[derive(Debug, Clone)]
pub struct RelaxationEngine {
    relax_factor: f64,
    timeout: Duration,
}

impl Default for RelaxationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_RELAX_FACTOR, Duration::from_secs(5))
    }
}

impl RelaxationEngine {
    /// `relax_factor` scales the budget ceiling on the last step; `timeout`
    /// bounds each catalog call.
    pub fn new(relax_factor: f64, timeout: Duration) -> Self {
        Self {
            relax_factor,
            timeout,
        }
    }

    /// Search, relaxing on empty results unless `strict`.
    ///
    /// 1. the query as built;
    /// 2. without the date window, if one was set;
    /// 3. with the ceiling scaled by the relax factor, date still dropped,
    ///    if a ceiling was set.
    ///
    /// Every step taken is reported in the returned flags, whether or not it
    /// found anything.
    pub async fn search(
        &self,
        catalog: &dyn OfferCatalog,
        query: &OfferQuery,
        strict: bool,
    ) -> (Vec<Offer>, UsedRelaxations) {
        let mut used = UsedRelaxations::default();

        let offers = self.attempt(catalog, query, "full").await;
        if !offers.is_empty() || strict {
            return (offers, used);
        }

        let mut current = query.clone();
        if current.has_date_filter() {
            current = current.without_date();
            used.date_relaxed = true;
            let offers = self.attempt(catalog, &current, "without_date").await;
            if !offers.is_empty() {
                return (offers, used);
            }
        }

        if let Some(relaxed) = current.with_scaled_ceiling(self.relax_factor) {
            used.budget_relaxed = true;
            let offers = self.attempt(catalog, &relaxed, "relaxed_budget").await;
            return (offers, used);
        }

        (Vec::new(), used)
    }

    /// One catalog call. Failures and timeouts count as an empty result.
    async fn attempt(&self, catalog: &dyn OfferCatalog, query: &OfferQuery, step: &str) -> Vec<Offer> {
        match with_timeout(self.timeout, catalog.search(query)).await {
            Ok(offers) => {
                debug!(attempt = step, found = offers.len(), "Catalog search");
                offers
            }
            Err(e) => {
                warn!(attempt = step, error = %e, "Catalog search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use wayfarer_core::types::{AccommodationLevel, TransportType};

    use crate::error::ChatError;

    /// In-memory catalog that filters on text, price and month window and
    /// records every query it receives.
    struct FakeCatalog {
        offers: Vec<Offer>,
        seen: Mutex<Vec<OfferQuery>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl FakeCatalog {
        fn new(offers: Vec<Offer>) -> Self {
            Self {
                offers,
                seen: Mutex::new(Vec::new()),
                fail: false,
                delay: None,
            }
        }

        fn queries(&self) -> Vec<OfferQuery> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OfferCatalog for FakeCatalog {
        async fn search(&self, query: &OfferQuery) -> Result<Vec<Offer>, ChatError> {
            self.seen.lock().unwrap().push(query.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ChatError::Catalog("database is locked".to_string()));
            }
            Ok(self
                .offers
                .iter()
                .filter(|o| match &query.text {
                    Some(t) => o.title.to_lowercase().contains(&t.to_lowercase()),
                    None => true,
                })
                .filter(|o| query.price_max.map_or(true, |max| o.price <= max))
                .filter(|o| query.price_min.map_or(true, |min| o.price >= min))
                .filter(|o| match (&query.window, o.start_date) {
                    (Some(w), Some(start)) => start >= w.start && start < w.end_exclusive,
                    (Some(_), None) => false,
                    (None, _) => true,
                })
                .take(query.limit)
                .cloned()
                .collect())
        }

        async fn vocabulary(&self, _limit: usize) -> Result<Vec<String>, ChatError> {
            Ok(Vec::new())
        }
    }

    fn offer(id: i64, title: &str, price: f64, start: Option<(i32, u32, u32)>) -> Offer {
        Offer {
            id,
            title: title.to_string(),
            description: None,
            destination: Some(title.to_string()),
            country: None,
            continent: None,
            price,
            start_date: start.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            end_date: None,
            duration_days: None,
            transport_type: None,
            accommodation_level: None,
            includes: Vec::new(),
            available_months: Vec::new(),
            star_rating: None,
            is_active: Some(true),
        }
    }

    fn bali_intent() -> Intent {
        Intent {
            destination: Some("Bali, Indonesia".to_string()),
            budget_max: Some(50.0),
            month: Some(1),
            year: Some(2025),
            ..Intent::default()
        }
    }

    // ---- build_query ----

    #[test]
    fn test_build_query_maps_every_filter() {
        let intent = Intent {
            destination: Some("Cairo".to_string()),
            budget_min: Some(100.0),
            budget_max: Some(900.0),
            duration_days: Some(4),
            month: Some(11),
            year: Some(2026),
            transport_type: Some(TransportType::Flight),
            accommodation_level: Some(AccommodationLevel::Standard),
            must_include: vec!["guide".to_string()],
            ..Intent::default()
        };
        let query = build_query(&intent, SortOrder::RatingDesc, 7);
        assert_eq!(query.text.as_deref(), Some("Cairo"));
        assert_eq!(query.price_min, Some(100.0));
        assert_eq!(query.price_max, Some(900.0));
        assert_eq!(query.window, DateWindow::for_month(2026, 11));
        assert_eq!(query.max_duration_days, Some(4));
        assert_eq!(query.transport, Some(TransportType::Flight));
        assert_eq!(query.accommodation, Some(AccommodationLevel::Standard));
        assert_eq!(query.must_include, vec!["guide"]);
        assert_eq!(query.sort, SortOrder::RatingDesc);
        assert_eq!(query.limit, 7);
    }

    #[test]
    fn test_build_query_text_fallbacks() {
        let intent = Intent {
            country: Some("Egypt".to_string()),
            continent: Some("Africa".to_string()),
            ..Intent::default()
        };
        assert_eq!(
            build_query(&intent, SortOrder::PriceAsc, 10).text.as_deref(),
            Some("Egypt")
        );

        let intent = Intent {
            continent: Some("Africa".to_string()),
            ..Intent::default()
        };
        assert_eq!(
            build_query(&intent, SortOrder::PriceAsc, 10).text.as_deref(),
            Some("Africa")
        );
    }

    #[test]
    fn test_build_query_month_without_year_has_no_window() {
        let intent = Intent {
            destination: Some("Cairo".to_string()),
            month: Some(3),
            ..Intent::default()
        };
        assert!(build_query(&intent, SortOrder::PriceAsc, 10).window.is_none());
    }

    // ---- relaxation ladder ----

    #[tokio::test]
    async fn test_full_match_needs_no_relaxation() {
        let catalog = FakeCatalog::new(vec![offer(1, "Bali, Indonesia", 40.0, Some((2025, 1, 10)))]);
        let query = build_query(&bali_intent(), SortOrder::PriceAsc, 10);
        let (offers, used) = RelaxationEngine::default()
            .search(&catalog, &query, false)
            .await;
        assert_eq!(offers.len(), 1);
        assert_eq!(used, UsedRelaxations::default());
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_date_relaxed_first() {
        let catalog = FakeCatalog::new(vec![offer(1, "Bali, Indonesia", 45.0, Some((2025, 3, 1)))]);
        let query = build_query(&bali_intent(), SortOrder::PriceAsc, 10);
        let (offers, used) = RelaxationEngine::default()
            .search(&catalog, &query, false)
            .await;
        assert_eq!(offers.len(), 1);
        assert!(used.date_relaxed);
        assert!(!used.budget_relaxed);
    }

    #[tokio::test]
    async fn test_budget_relaxed_after_date() {
        let catalog = FakeCatalog::new(vec![
            offer(1, "Bali, Indonesia", 70.0, Some((2025, 3, 1))),
            offer(2, "Bali, Indonesia", 80.0, Some((2025, 1, 5))),
        ]);
        let query = build_query(&bali_intent(), SortOrder::PriceAsc, 10);
        let (offers, used) = RelaxationEngine::default()
            .search(&catalog, &query, false)
            .await;

        assert!(used.date_relaxed);
        assert!(used.budget_relaxed);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id, 1);

        let queries = catalog.queries();
        assert_eq!(queries.len(), 3);
        assert!(queries[1].window.is_none());
        assert!(queries[2].window.is_none());
        assert_eq!(queries[2].price_max, Some(75.0));
        assert!(queries.iter().all(|q| q.sort == SortOrder::PriceAsc));
    }

    #[tokio::test]
    async fn test_budget_step_without_date_filter() {
        let catalog = FakeCatalog::new(vec![offer(1, "Cairo", 120.0, None)]);
        let intent = Intent {
            destination: Some("Cairo".to_string()),
            budget_max: Some(100.0),
            ..Intent::default()
        };
        let query = build_query(&intent, SortOrder::PriceAsc, 10);
        let (offers, used) = RelaxationEngine::default()
            .search(&catalog, &query, false)
            .await;
        assert_eq!(offers.len(), 1);
        assert!(!used.date_relaxed);
        assert!(used.budget_relaxed);
        assert_eq!(catalog.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_no_ceiling_means_no_budget_step() {
        let catalog = FakeCatalog::new(vec![]);
        let intent = Intent {
            destination: Some("Cairo".to_string()),
            budget_min: Some(100.0),
            ..Intent::default()
        };
        let query = build_query(&intent, SortOrder::PriceAsc, 10);
        let (offers, used) = RelaxationEngine::default()
            .search(&catalog, &query, false)
            .await;
        assert!(offers.is_empty());
        assert_eq!(used, UsedRelaxations::default());
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_strict_never_relaxes() {
        let catalog = FakeCatalog::new(vec![offer(1, "Bali, Indonesia", 45.0, Some((2025, 3, 1)))]);
        let query = build_query(&bali_intent(), SortOrder::PriceAsc, 10);
        let (offers, used) = RelaxationEngine::default()
            .search(&catalog, &query, true)
            .await;
        assert!(offers.is_empty());
        assert!(!used.date_relaxed);
        assert!(!used.budget_relaxed);
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_errors_count_as_empty() {
        let mut catalog = FakeCatalog::new(vec![offer(1, "Bali, Indonesia", 10.0, None)]);
        catalog.fail = true;
        let query = build_query(&bali_intent(), SortOrder::PriceAsc, 10);
        let (offers, used) = RelaxationEngine::default()
            .search(&catalog, &query, false)
            .await;
        assert!(offers.is_empty());
        assert!(used.date_relaxed);
        assert!(used.budget_relaxed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_timeout_counts_as_empty() {
        let mut catalog = FakeCatalog::new(vec![offer(1, "Bali, Indonesia", 10.0, None)]);
        catalog.delay = Some(Duration::from_secs(30));
        let engine = RelaxationEngine::new(1.5, Duration::from_millis(100));
        let query = build_query(&bali_intent(), SortOrder::PriceAsc, 10);
        let (offers, _) = engine.search(&catalog, &query, true).await;
        assert!(offers.is_empty());
    }
}
