//! Location and vocabulary matching.
//!
//! Fuzzy destination matching against catalog strings, plus keyword
//! canonicalization of transport and accommodation synonyms.

use std::cmp::min;
use std::sync::LazyLock;

use regex::Regex;

use wayfarer_core::types::{AccommodationLevel, TransportType};

/// Minimum similarity for a pool entry to count as a match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.6;

// =============================================================================
// Edit distance
// =============================================================================

/// Unit-cost Levenshtein distance over Unicode scalar values, computed with
/// the full dynamic-programming matrix.
#[allow(clippy::needless_range_loop)]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());

    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut matrix = vec![vec![0usize; m + 1]; n + 1];
    for i in 0..=n {
        matrix[i][0] = i;
    }
    for j in 0..=m {
        matrix[0][j] = j;
    }

    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            matrix[i][j] = min(
                min(matrix[i - 1][j] + 1, matrix[i][j - 1] + 1),
                matrix[i - 1][j - 1] + cost,
            );
        }
    }

    matrix[n][m]
}

/// Lower-case and drop everything that is not alphanumeric.
fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// `1 - distance / max_len` over folded strings, in `[0, 1]`.
///
/// Two strings that fold to empty are considered dissimilar.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (fold(a), fold(b));
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

/// Score a pool entry as the best of the whole entry and each of its
/// comma, slash or dash separated segments.
fn entry_score(candidate: &str, entry: &str) -> f64 {
    entry
        .split([',', '/', '-', '(', ')'])
        .map(|segment| similarity(candidate, segment))
        .fold(similarity(candidate, entry), f64::max)
}

/// Best pool entry for `candidate` at the default threshold.
pub fn fuzzy_match<'a, S: AsRef<str>>(candidate: &str, pool: &'a [S]) -> Option<&'a str> {
    fuzzy_match_with_threshold(candidate, pool, DEFAULT_FUZZY_THRESHOLD)
}

/// Best pool entry whose score reaches `threshold`. Ties keep the earliest
/// entry in pool order.
pub fn fuzzy_match_with_threshold<'a, S: AsRef<str>>(
    candidate: &str,
    pool: &'a [S],
    threshold: f64,
) -> Option<&'a str> {
    if fold(candidate).is_empty() {
        return None;
    }

    let mut best: Option<(&'a str, f64)> = None;
    for entry in pool {
        let entry = entry.as_ref();
        let score = entry_score(candidate, entry);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((entry, score));
        }
    }

    best.filter(|(_, score)| *score >= threshold)
        .map(|(entry, _)| entry)
}

// =============================================================================
// Keyword canonicalization
// =============================================================================

/// Replace every match of `re` in `text` with spaces of the same byte length,
/// so offsets into the original stay valid.
pub(crate) fn blank_out(text: &str, re: &Regex) -> String {
    re.replace_all(text, |caps: &regex::Captures| " ".repeat(caps[0].len()))
        .into_owned()
}

struct KeywordFamily<T> {
    keywords: Vec<(T, Regex)>,
    negation: Regex,
}

impl<T: Copy> KeywordFamily<T> {
    fn new(table: &[(T, &str)]) -> Self {
        let keywords = table
            .iter()
            .map(|(value, alternation)| {
                let re = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                    .expect("Invalid keyword regex");
                (*value, re)
            })
            .collect();

        let all: Vec<&str> = table.iter().map(|(_, alt)| *alt).collect();
        let negation = Regex::new(&format!(
            r"(?i)\b(?:not|no|without|avoid|don'?t\s+want)\s+(?:(?:a|an|any|the)\s+)?(?:{})\b",
            all.join("|")
        ))
        .expect("Invalid negation regex");

        Self { keywords, negation }
    }

    /// Value of the last non-negated keyword mention.
    fn last_mention(&self, text: &str) -> Option<T> {
        let cleaned = blank_out(text, &self.negation);
        self.keywords
            .iter()
            .filter_map(|(value, re)| re.find_iter(&cleaned).last().map(|m| (m.start(), *value)))
            .max_by_key(|(pos, _)| *pos)
            .map(|(_, value)| value)
    }

    fn mask(&self, text: &str) -> String {
        let text = blank_out(text, &self.negation);
        self.keywords
            .iter()
            .fold(text, |acc, (_, re)| blank_out(&acc, re))
    }
}

static TRANSPORT: LazyLock<KeywordFamily<TransportType>> = LazyLock::new(|| {
    KeywordFamily::new(&[
        (
            TransportType::Flight,
            r"flights?|fly|flying|plane|airplane|aeroplane|air|airlines?",
        ),
        (TransportType::Train, r"trains?|rail|railway"),
        (TransportType::Bus, r"bus|buses|coach|coaches"),
    ])
});

static ACCOMMODATION: LazyLock<KeywordFamily<AccommodationLevel>> = LazyLock::new(|| {
    KeywordFamily::new(&[
        (
            AccommodationLevel::Luxury,
            r"luxury|luxurious|deluxe|5[\s-]?stars?|five[\s-]?stars?",
        ),
        (
            AccommodationLevel::Premium,
            r"premium|superior|4[\s-]?stars?|four[\s-]?stars?",
        ),
        (
            AccommodationLevel::Standard,
            r"standard|basic|economy|3[\s-]?stars?|three[\s-]?stars?",
        ),
    ])
});

/// Canonical transport mode named in `text`, ignoring negated mentions.
/// The last mention wins.
pub fn canonical_transport(text: &str) -> Option<TransportType> {
    TRANSPORT.last_mention(text)
}

/// Canonical accommodation tier named in `text`, ignoring negated mentions.
/// The last mention wins.
pub fn canonical_accommodation(text: &str) -> Option<AccommodationLevel> {
    ACCOMMODATION.last_mention(text)
}

/// Blank out every transport and accommodation keyword (negated or not).
pub(crate) fn mask_vocabulary(text: &str) -> String {
    ACCOMMODATION.mask(&TRANSPORT.mask(text))
}
