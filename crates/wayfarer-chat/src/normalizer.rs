//! Intent normalizer.
//!
//! Coerces an untyped extraction payload into a canonical [`Intent`]. Values
//! of the wrong type or out of range are dropped, never guessed.

use std::collections::HashSet;

use serde_json::{Map, Value};

use wayfarer_core::types::Intent;

use crate::matcher::{canonical_accommodation, canonical_transport};

const MAX_DURATION_DAYS: u32 = 365;
const MAX_PEOPLE: u32 = 100;

/// Build an [`Intent`] from an arbitrary JSON value. Anything other than an
/// object yields an empty intent.
pub fn normalize_payload(payload: &Value) -> Intent {
    let Some(obj) = payload.as_object() else {
        return Intent::default();
    };

    let intent = Intent {
        destination: text(obj, "destination"),
        country: text(obj, "country"),
        continent: text(obj, "continent"),
        budget_min: number(obj, "budgetMin"),
        budget_max: number(obj, "budgetMax"),
        duration_days: whole(obj, "durationDays").and_then(|n| u32::try_from(n).ok()),
        month: whole(obj, "month").and_then(|n| u32::try_from(n).ok()),
        year: whole(obj, "year").and_then(|n| i32::try_from(n).ok()),
        transport_type: text(obj, "transportType").and_then(|s| canonical_transport(&s)),
        accommodation_level: text(obj, "accommodationLevel")
            .and_then(|s| canonical_accommodation(&s)),
        people_count: whole(obj, "peopleCount").and_then(|n| u32::try_from(n).ok()),
        must_include: list(obj, "mustInclude"),
        nice_to_have: list(obj, "niceToHave"),
        notes: text(obj, "notes"),
    };

    sanitize_intent(intent)
}

/// Enforce canonical form on an already-typed intent: trimmed
/// non-empty strings, finite non-negative budgets in ascending order, and
/// in-range calendar and count fields.
pub fn sanitize_intent(intent: Intent) -> Intent {
    let mut budget_min = intent.budget_min.filter(|v| v.is_finite() && *v >= 0.0);
    let mut budget_max = intent.budget_max.filter(|v| v.is_finite() && *v >= 0.0);
    if let (Some(lo), Some(hi)) = (budget_min, budget_max) {
        if lo > hi {
            budget_min = Some(hi);
            budget_max = Some(lo);
        }
    }

    Intent {
        destination: clean_text(intent.destination),
        country: clean_text(intent.country),
        continent: clean_text(intent.continent),
        budget_min,
        budget_max,
        duration_days: intent
            .duration_days
            .filter(|d| (1..=MAX_DURATION_DAYS).contains(d)),
        month: intent.month.filter(|m| (1..=12).contains(m)),
        year: intent.year.filter(|y| (1000..=9999).contains(y)),
        transport_type: intent.transport_type,
        accommodation_level: intent.accommodation_level,
        people_count: intent.people_count.filter(|p| (1..=MAX_PEOPLE).contains(p)),
        must_include: clean_list(intent.must_include),
        nice_to_have: clean_list(intent.nice_to_have),
        notes: clean_text(intent.notes),
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Trimmed, non-empty, case-insensitively unique entries in first-seen order.
fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter_map(|v| clean_text(Some(v)))
        .filter(|v| seen.insert(v.to_lowercase()))
        .collect()
}

/// Look up a camelCase key, falling back to its snake_case spelling
/// (`budgetMax`, then `budget_max`).
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = obj.get(key) {
        return Some(value);
    }
    let mut snake = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            snake.push('_');
            snake.push(c.to_ascii_lowercase());
        } else {
            snake.push(c);
        }
    }
    obj.get(&snake)
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    field(obj, key)
        .and_then(Value::as_str)
        .and_then(|s| clean_text(Some(s.to_string())))
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    field(obj, key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

/// An integral JSON number (`5` or `5.0`, not `5.5`).
fn whole(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = number(obj, key)?;
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    let items = match field(obj, key).and_then(Value::as_array) {
        Some(items) => items,
        None => return Vec::new(),
    };
    clean_list(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wayfarer_core::types::{AccommodationLevel, TransportType};

    #[test]
    fn test_full_payload() {
        let payload = json!({
            "destination": "  Bali ",
            "country": "Indonesia",
            "continent": null,
            "budgetMin": 500,
            "budgetMax": 1500.5,
            "durationDays": 7,
            "month": 3,
            "year": 2027,
            "transportType": "Flight",
            "accommodationLevel": "5 star",
            "peopleCount": 2,
            "mustInclude": ["spa", "  ", "Spa", 4, "breakfast"],
            "niceToHave": "not a list",
            "notes": "honeymoon"
        });
        let intent = normalize_payload(&payload);
        assert_eq!(intent.destination.as_deref(), Some("Bali"));
        assert_eq!(intent.country.as_deref(), Some("Indonesia"));
        assert!(intent.continent.is_none());
        assert_eq!(intent.budget_min, Some(500.0));
        assert_eq!(intent.budget_max, Some(1500.5));
        assert_eq!(intent.duration_days, Some(7));
        assert_eq!(intent.month, Some(3));
        assert_eq!(intent.year, Some(2027));
        assert_eq!(intent.transport_type, Some(TransportType::Flight));
        assert_eq!(intent.accommodation_level, Some(AccommodationLevel::Luxury));
        assert_eq!(intent.people_count, Some(2));
        assert_eq!(intent.must_include, vec!["spa", "breakfast"]);
        assert!(intent.nice_to_have.is_empty());
        assert_eq!(intent.notes.as_deref(), Some("honeymoon"));
    }

    #[test]
    fn test_snake_case_keys() {
        let payload = json!({
            "destination": "Cairo",
            "budget_min": 300,
            "budget_max": 900,
            "duration_days": 4,
            "transport_type": "bus",
            "accommodation_level": "standard",
            "people_count": 3,
            "must_include": ["pyramids"],
            "budgetMax": 950,
        });
        let intent = normalize_payload(&payload);
        assert_eq!(intent.budget_min, Some(300.0));
        assert_eq!(intent.budget_max, Some(950.0));
        assert_eq!(intent.duration_days, Some(4));
        assert_eq!(intent.transport_type, Some(TransportType::Bus));
        assert_eq!(intent.accommodation_level, Some(AccommodationLevel::Standard));
        assert_eq!(intent.people_count, Some(3));
        assert_eq!(intent.must_include, vec!["pyramids"]);
    }

    #[test]
    fn test_wrong_types_become_null() {
        let payload = json!({
            "destination": 42,
            "budgetMax": "1000",
            "durationDays": 3.5,
            "month": "March",
            "year": true,
            "peopleCount": [2],
        });
        let intent = normalize_payload(&payload);
        assert_eq!(intent, Intent::default());
    }

    #[test]
    fn test_literal_null_string_is_folded() {
        let payload = json!({
            "destination": "null",
            "transportType": "NULL",
            "accommodationLevel": "null",
        });
        let intent = normalize_payload(&payload);
        assert!(intent.destination.is_none());
        assert!(intent.transport_type.is_none());
        assert!(intent.accommodation_level.is_none());
    }

    #[test]
    fn test_out_of_range_values_dropped() {
        let payload = json!({
            "budgetMin": -10,
            "durationDays": 0,
            "month": 13,
            "year": 26,
            "peopleCount": 0,
        });
        let intent = normalize_payload(&payload);
        assert!(intent.budget_min.is_none());
        assert!(intent.duration_days.is_none());
        assert!(intent.month.is_none());
        assert!(intent.year.is_none());
        assert!(intent.people_count.is_none());
    }

    #[test]
    fn test_unknown_vocabulary_dropped() {
        let payload = json!({ "transportType": "car", "accommodationLevel": "hostel" });
        let intent = normalize_payload(&payload);
        assert!(intent.transport_type.is_none());
        assert!(intent.accommodation_level.is_none());
    }

    #[test]
    fn test_non_object_payloads() {
        for payload in [json!(null), json!([1, 2]), json!("Bali"), json!(3)] {
            assert_eq!(normalize_payload(&payload), Intent::default());
        }
    }

    #[test]
    fn test_sanitize_reorders_inverted_budget() {
        let intent = sanitize_intent(Intent {
            budget_min: Some(2000.0),
            budget_max: Some(800.0),
            ..Intent::default()
        });
        assert_eq!(intent.budget_min, Some(800.0));
        assert_eq!(intent.budget_max, Some(2000.0));
    }

    #[test]
    fn test_sanitize_drops_non_finite() {
        let intent = sanitize_intent(Intent {
            budget_max: Some(f64::NAN),
            budget_min: Some(f64::INFINITY),
            ..Intent::default()
        });
        assert!(intent.budget_max.is_none());
        assert!(intent.budget_min.is_none());
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let intent = normalize_payload(&json!({
            "destination": " Cairo ",
            "budgetMax": 900,
            "mustInclude": ["Pool", "pool"],
        }));
        assert_eq!(sanitize_intent(intent.clone()), intent);
    }
}
