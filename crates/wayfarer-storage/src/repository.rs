//! Offer repository over the SQLite catalog.
//!
//! Search predicates are assembled as SQL fragments with boxed positional
//! parameters; each fragment pushes its parameters in the order its `?`
//! markers appear.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::OptionalExtension;

use wayfarer_core::error::WayfarerError;
use wayfarer_core::types::{Offer, OfferQuery, SortOrder};

use crate::db::Database;

const OFFER_COLUMNS: &str = "id, title, description, destination, country, continent, price,
     start_date, end_date, duration_days, transport_type, accommodation_level,
     includes, available_months, star_rating, is_active";

/// Effective offer length: explicit duration, else the date span.
const DURATION_EXPR: &str =
    "COALESCE(duration_days, CAST(julianday(end_date) - julianday(start_date) AS INTEGER))";

/// Repository for catalog offers.
#[derive(Clone)]
pub struct OfferRepository {
    db: Arc<Database>,
}

impl OfferRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an offer and return its new id. The `id` field of the input is
    /// ignored.
    pub fn insert(&self, offer: &Offer) -> Result<i64, WayfarerError> {
        let includes = serde_json::to_string(&offer.includes)?;
        let months = serde_json::to_string(&offer.available_months)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO offers (title, description, destination, country, continent, price,
                                     start_date, end_date, duration_days, transport_type,
                                     accommodation_level, includes, available_months,
                                     star_rating, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                rusqlite::params![
                    offer.title,
                    offer.description,
                    offer.destination,
                    offer.country,
                    offer.continent,
                    offer.price,
                    offer.start_date.map(format_date),
                    offer.end_date.map(format_date),
                    offer.duration_days,
                    offer.transport_type,
                    offer.accommodation_level,
                    includes,
                    months,
                    offer.star_rating,
                    offer.is_active,
                ],
            )
            .map_err(|e| WayfarerError::Storage(format!("Failed to insert offer: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Find an offer by id.
    pub fn find_by_id(&self, id: i64) -> Result<Option<Offer>, WayfarerError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {} FROM offers WHERE id = ?1", OFFER_COLUMNS);
            let result = conn
                .query_row(&sql, rusqlite::params![id], |row| Ok(row_to_offer(row)))
                .optional()
                .map_err(|e| WayfarerError::Storage(e.to_string()))?;

            match result {
                Some(offer) => Ok(Some(offer?)),
                None => Ok(None),
            }
        })
    }

    /// Number of offers in the catalog, active or not.
    pub fn count(&self) -> Result<i64, WayfarerError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM offers", [], |row| row.get(0))
                .map_err(|e| WayfarerError::Storage(e.to_string()))
        })
    }

    /// Run a predicate search. Inactive offers are always excluded; a null
    /// active flag counts as active.
    pub fn search(&self, query: &OfferQuery) -> Result<Vec<Offer>, WayfarerError> {
        let mut clauses: Vec<String> = vec!["(is_active = 1 OR is_active IS NULL)".to_string()];
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(text) = query.text.as_deref() {
            let pattern = like_pattern(text);
            clauses.push(
                "(LOWER(title) LIKE ? ESCAPE '\\'
                  OR LOWER(COALESCE(destination, '')) LIKE ? ESCAPE '\\'
                  OR LOWER(COALESCE(country, '')) LIKE ? ESCAPE '\\'
                  OR LOWER(COALESCE(continent, '')) LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            for _ in 0..4 {
                params.push(Box::new(pattern.clone()));
            }
        }

        if let Some(min) = query.price_min {
            clauses.push("price >= ?".to_string());
            params.push(Box::new(min.max(0.0)));
        }
        if let Some(max) = query.price_max {
            clauses.push("price <= ?".to_string());
            params.push(Box::new(max.max(0.0)));
        }

        if let Some(window) = &query.window {
            clauses.push(
                "((start_date >= ? AND start_date < ?)
                  OR EXISTS (SELECT 1 FROM json_each(offers.available_months) m
                             WHERE m.value = ?))"
                    .to_string(),
            );
            params.push(Box::new(format_date(window.start)));
            params.push(Box::new(format_date(window.end_exclusive)));
            params.push(Box::new(window.month_key()));
        }

        if let Some(days) = query.max_duration_days {
            // Offers of unknown length are not excluded.
            clauses.push(format!("({0} IS NULL OR {0} <= ?)", DURATION_EXPR));
            params.push(Box::new(days));
        }

        if let Some(transport) = query.transport {
            clauses.push("LOWER(COALESCE(transport_type, '')) LIKE ? ESCAPE '\\'".to_string());
            params.push(Box::new(like_pattern(transport.as_str())));
        }
        if let Some(level) = query.accommodation {
            clauses
                .push("LOWER(COALESCE(accommodation_level, '')) LIKE ? ESCAPE '\\'".to_string());
            params.push(Box::new(like_pattern(level.as_str())));
        }

        if !query.must_include.is_empty() {
            let alternatives = vec!["LOWER(i.value) LIKE ? ESCAPE '\\'"; query.must_include.len()];
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM json_each(offers.includes) i WHERE {})",
                alternatives.join(" OR ")
            ));
            for tag in &query.must_include {
                params.push(Box::new(like_pattern(tag)));
            }
        }

        let order = match query.sort {
            SortOrder::PriceAsc => "price ASC, id ASC",
            SortOrder::PriceDesc => "price DESC, id ASC",
            SortOrder::RatingDesc => "star_rating IS NULL, star_rating DESC, price ASC, id ASC",
        };

        let sql = format!(
            "SELECT {} FROM offers WHERE {} ORDER BY {} LIMIT ?",
            OFFER_COLUMNS,
            clauses.join(" AND "),
            order
        );
        params.push(Box::new(query.limit as i64));

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| WayfarerError::Storage(format!("Failed to prepare search: {}", e)))?;

            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();

            let rows = stmt
                .query_map(params_refs.as_slice(), |row| Ok(row_to_offer(row)))
                .map_err(|e| WayfarerError::Storage(e.to_string()))?;

            let mut offers = Vec::new();
            for row in rows {
                let offer = row.map_err(|e| WayfarerError::Storage(e.to_string()))??;
                offers.push(offer);
            }
            Ok(offers)
        })
    }

    /// Distinct destination and country strings from the `limit` most
    /// recently added active offers, newest first.
    pub fn recent_vocabulary(&self, limit: usize) -> Result<Vec<String>, WayfarerError> {
        let pairs: Vec<(Option<String>, Option<String>)> = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT destination, country FROM offers
                     WHERE is_active = 1 OR is_active IS NULL
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?1",
                )
                .map_err(|e| WayfarerError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![limit as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .map_err(|e| WayfarerError::Storage(e.to_string()))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| WayfarerError::Storage(e.to_string()))
        })?;

        let mut seen = HashSet::new();
        let mut vocabulary = Vec::new();
        for value in pairs.into_iter().flat_map(|(d, c)| [d, c]).flatten() {
            let trimmed = value.trim();
            if !trimmed.is_empty() && seen.insert(trimmed.to_lowercase()) {
                vocabulary.push(trimmed.to_string());
            }
        }
        Ok(vocabulary)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>, WayfarerError> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| WayfarerError::Storage(format!("Invalid date '{}': {}", s, e)))
        })
        .transpose()
}

/// Lower-cased `%term%` pattern with LIKE wildcards escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn row_to_offer(row: &rusqlite::Row) -> Result<Offer, WayfarerError> {
    let get_err = |e: rusqlite::Error| WayfarerError::Storage(e.to_string());

    let includes: String = row.get(12).map_err(get_err)?;
    let months: String = row.get(13).map_err(get_err)?;
    let duration: Option<i64> = row.get(9).map_err(get_err)?;

    Ok(Offer {
        id: row.get(0).map_err(get_err)?,
        title: row.get(1).map_err(get_err)?,
        description: row.get(2).map_err(get_err)?,
        destination: row.get(3).map_err(get_err)?,
        country: row.get(4).map_err(get_err)?,
        continent: row.get(5).map_err(get_err)?,
        price: row.get(6).map_err(get_err)?,
        start_date: parse_date(row.get(7).map_err(get_err)?)?,
        end_date: parse_date(row.get(8).map_err(get_err)?)?,
        duration_days: duration.and_then(|d| u32::try_from(d).ok()),
        transport_type: row.get(10).map_err(get_err)?,
        accommodation_level: row.get(11).map_err(get_err)?,
        includes: serde_json::from_str(&includes)?,
        available_months: serde_json::from_str(&months)?,
        star_rating: row.get(14).map_err(get_err)?,
        is_active: row.get(15).map_err(get_err)?,
    })
}
