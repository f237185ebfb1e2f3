use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::WayfarerError;

// =============================================================================
// Enums
// =============================================================================

/// Canonical transport mode of an offer or a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Flight,
    Train,
    Bus,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Flight => "flight",
            TransportType::Train => "train",
            TransportType::Bus => "bus",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical accommodation tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccommodationLevel {
    Standard,
    Premium,
    Luxury,
}

impl AccommodationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccommodationLevel::Standard => "standard",
            AccommodationLevel::Premium => "premium",
            AccommodationLevel::Luxury => "luxury",
        }
    }
}

impl fmt::Display for AccommodationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result ordering. The same order is used for every relaxation attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "price:asc")]
    PriceAsc,
    #[serde(rename = "price:desc")]
    PriceDesc,
    #[serde(rename = "rating:desc")]
    RatingDesc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::PriceAsc => "price:asc",
            SortOrder::PriceDesc => "price:desc",
            SortOrder::RatingDesc => "rating:desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = WayfarerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "price:asc" => Ok(SortOrder::PriceAsc),
            "price:desc" => Ok(SortOrder::PriceDesc),
            "rating:desc" => Ok(SortOrder::RatingDesc),
            other => Err(WayfarerError::InvalidValue {
                field: "sort".to_string(),
                reason: format!(
                    "'{}' is not one of price:asc, price:desc, rating:desc",
                    other
                ),
            }),
        }
    }
}

// =============================================================================
// Intent
// =============================================================================

/// Structured interpretation of what the traveller asked for.
///
/// Every field is optional; anything not confidently populated stays `None`
/// or empty. Serialized in camelCase because it is returned to clients as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub destination: Option<String>,
    pub country: Option<String>,
    pub continent: Option<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub duration_days: Option<u32>,
    /// 1-12.
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub transport_type: Option<TransportType>,
    pub accommodation_level: Option<AccommodationLevel>,
    pub people_count: Option<u32>,
    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub nice_to_have: Vec<String>,
    pub notes: Option<String>,
}

impl Intent {
    pub fn has_destination(&self) -> bool {
        self.destination.is_some()
    }

    pub fn has_budget(&self) -> bool {
        self.budget_min.is_some() || self.budget_max.is_some()
    }

    pub fn has_date(&self) -> bool {
        self.month.is_some()
    }
}

// =============================================================================
// Catalog offer
// =============================================================================

/// A bookable offer as stored in the catalog.
///
/// `transport_type` and `accommodation_level` are free text on the catalog
/// side; queries match them by case-insensitive containment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub destination: Option<String>,
    pub country: Option<String>,
    pub continent: Option<String>,
    pub price: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_days: Option<u32>,
    pub transport_type: Option<String>,
    pub accommodation_level: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    /// Extra departure months in `YYYY-MM` form.
    #[serde(default)]
    pub available_months: Vec<String>,
    pub star_rating: Option<f64>,
    /// `None` is treated as active (legacy rows).
    pub is_active: Option<bool>,
}

// =============================================================================
// Search query
// =============================================================================

/// A calendar month used as a date filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateWindow {
    /// First day of the month.
    pub start: NaiveDate,
    /// First day of the following month.
    pub end_exclusive: NaiveDate,
}

impl DateWindow {
    /// Build the window for a month, or `None` for an invalid month/year.
    pub fn for_month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end_exclusive = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start,
            end_exclusive,
        })
    }

    /// The `YYYY-MM` key matched against an offer's available months.
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.start.year(), self.start.month())
    }
}

/// Predicate handed to the offer catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct OfferQuery {
    /// Case-insensitive containment over title, destination, country and continent.
    pub text: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub window: Option<DateWindow>,
    pub max_duration_days: Option<u32>,
    pub transport: Option<TransportType>,
    pub accommodation: Option<AccommodationLevel>,
    /// At least one of these tags must appear in the offer's includes.
    pub must_include: Vec<String>,
    pub sort: SortOrder,
    pub limit: usize,
}

impl OfferQuery {
    /// An unfiltered query with the given order and limit.
    pub fn new(sort: SortOrder, limit: usize) -> Self {
        Self {
            text: None,
            price_min: None,
            price_max: None,
            window: None,
            max_duration_days: None,
            transport: None,
            accommodation: None,
            must_include: Vec::new(),
            sort,
            limit,
        }
    }

    pub fn has_date_filter(&self) -> bool {
        self.window.is_some()
    }

    /// Copy of this query with the date window removed.
    pub fn without_date(&self) -> Self {
        Self {
            window: None,
            ..self.clone()
        }
    }

    /// Copy of this query with the price ceiling multiplied by `factor`.
    /// Returns `None` when there is no ceiling to relax.
    pub fn with_scaled_ceiling(&self, factor: f64) -> Option<Self> {
        let ceiling = self.price_max?;
        Some(Self {
            price_max: Some(ceiling * factor),
            ..self.clone()
        })
    }
}

/// Which relaxations were needed to produce the returned offers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedRelaxations {
    pub date_relaxed: bool,
    pub budget_relaxed: bool,
}
