//! Heuristic text extractor.
//!
//! Deterministic fallback used when the language-understanding service is
//! unavailable: pulls a budget ceiling, a "to <place>" destination and a
//! "next month" travel month out of raw text. Never fails.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use wayfarer_core::types::Intent;

// =============================================================================
// Patterns
// =============================================================================

static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    let number = r"(\d{1,3}(?:,\d{3})+|\d{2,7})(?:\.\d{1,2})?";
    Regex::new(&format!(
        r"(?i)(?:[$€£]\s?{n}|{n}\s?(?:usd|eur|egp|gbp|dollars?|euros?|pounds?|bucks)\b|\bbudget\s+(?:of\s+|is\s+|around\s+|about\s+)?{n})",
        n = number
    ))
    .expect("Invalid currency regex")
});

static TO_PLACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bto\s+").expect("Invalid destination regex"));

static PLACE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\p{L}][A-Za-z\p{L}'\-]*").expect("Invalid word regex"));

static NEXT_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnext\s+month\b").expect("Invalid next-month regex"));

/// Words that follow "to" in verb phrases ("want to go to ...").
const VERBS: &[&str] = &[
    "go", "travel", "visit", "fly", "see", "book", "explore", "get", "head", "be", "spend", "have",
    "take", "stay", "experience", "relax", "enjoy", "plan", "make", "find", "know", "return",
    "leave", "do", "try", "tour", "escape", "move", "come",
];

/// Words that end a place name.
const STOP_WORDS: &[&str] = &[
    "with", "for", "next", "in", "on", "this", "that", "and", "or", "by", "under", "around",
    "about", "budget", "from", "during", "at", "please", "within", "max", "maximum", "between",
    "leaving", "departing", "sometime", "including", "me", "us", "i", "we", "my", "our", "but",
    "if", "so", "then", "via", "using", "cheap", "asap",
];

const MAX_PLACE_WORDS: usize = 4;

// =============================================================================
// Extractor
// =============================================================================

/// Regex/keyword fallback extractor. Stateless.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Best-effort partial intent. Unmatched fields stay `None`.
    pub fn extract(&self, text: &str, today: NaiveDate) -> Intent {
        let (month, year) = if NEXT_MONTH.is_match(text) {
            let (m, y) = month_after(today);
            (Some(m), Some(y))
        } else {
            (None, None)
        };

        Intent {
            destination: extract_destination(text),
            budget_max: extract_budget(text),
            month,
            year,
            ..Intent::default()
        }
    }
}

/// Month and year of the calendar month following `today`.
pub(crate) fn month_after(today: NaiveDate) -> (u32, i32) {
    if today.month() == 12 {
        (1, today.year() + 1)
    } else {
        (today.month() + 1, today.year())
    }
}

fn extract_budget(text: &str) -> Option<f64> {
    let caps = CURRENCY_AMOUNT.captures(text)?;
    let digits = caps
        .iter()
        .skip(1)
        .flatten()
        .next()?
        .as_str()
        .replace(',', "");
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn extract_destination(text: &str) -> Option<String> {
    for m in TO_PLACE.find_iter(text) {
        let rest = &text[m.end()..];
        let words = place_words(rest);
        let Some(first) = words.first() else {
            continue;
        };
        if VERBS.contains(&first.to_lowercase().as_str()) {
            continue;
        }
        return Some(words.join(" "));
    }
    None
}

/// Leading run of place-name words, dropping a leading "the" and stopping at
/// a stop word, a digit or punctuation.
pub(crate) fn place_words(rest: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut cursor = rest;
    loop {
        let Some(word) = PLACE_WORD.find(cursor) else {
            break;
        };
        let token = word.as_str().trim_end_matches(['-', '\'']);
        let lower = token.to_lowercase();
        if STOP_WORDS.contains(&lower.as_str()) {
            break;
        }
        if !(words.is_empty() && lower == "the") {
            words.push(token);
        }
        if words.len() == MAX_PLACE_WORDS {
            break;
        }

        let after = &cursor[word.end()..];
        let trimmed = after.trim_start_matches([' ', '\t']);
        if trimmed.len() == after.len() {
            // Punctuation or end of text directly after the word.
            break;
        }
        cursor = trimmed;
    }
    words
}
