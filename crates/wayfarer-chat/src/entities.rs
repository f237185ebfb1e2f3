//! Free-form entity extraction.
//!
//! An ordered pipeline of independent passes over one utterance. Each pass
//! reads the utterance, writes what it found into an [`IntentPatch`], and
//! blanks out the text it consumed so later passes do not re-read it
//! (durations are consumed before budgets are scanned, for example).
//! Later passes and later mentions win; absence of a signal never clears a
//! value.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use wayfarer_core::types::{AccommodationLevel, Intent, TransportType};

use crate::heuristic::month_after;
use crate::matcher::{canonical_accommodation, canonical_transport};

// =============================================================================
// Utterance and patch
// =============================================================================

/// Text under extraction. Consumed spans are replaced by spaces of equal
/// byte length, so match offsets stay valid across passes.
#[derive(Debug, Clone)]
pub struct Utterance {
    masked: String,
}

impl Utterance {
    pub fn new(text: &str) -> Self {
        Self {
            masked: text.to_string(),
        }
    }

    /// The text with consumed spans blanked.
    pub fn remaining(&self) -> &str {
        &self.masked
    }

    /// Blank out `range` of the remaining text.
    pub fn consume(&mut self, range: Range<usize>) {
        if range.start >= range.end || range.end > self.masked.len() {
            return;
        }
        if !self.masked.is_char_boundary(range.start) || !self.masked.is_char_boundary(range.end)
        {
            return;
        }
        let blanks = " ".repeat(range.end - range.start);
        self.masked.replace_range(range, &blanks);
    }

    /// Nothing but blanks and punctuation left.
    pub fn is_exhausted(&self) -> bool {
        self.masked.chars().all(|c| !c.is_alphanumeric())
    }
}

/// Slot values found in one utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentPatch {
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub duration_days: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub transport_type: Option<TransportType>,
    pub accommodation_level: Option<AccommodationLevel>,
    pub people_count: Option<u32>,
}

impl IntentPatch {
    pub fn is_empty(&self) -> bool {
        *self == IntentPatch::default()
    }

    /// Overwrite `intent` with every value present in this patch.
    pub fn apply_to(&self, intent: &mut Intent) {
        if let Some(v) = self.budget_min {
            intent.budget_min = Some(v);
        }
        if let Some(v) = self.budget_max {
            intent.budget_max = Some(v);
        }
        if let Some(v) = self.duration_days {
            intent.duration_days = Some(v);
        }
        if let Some(v) = self.month {
            intent.month = Some(v);
        }
        if let Some(v) = self.year {
            intent.year = Some(v);
        }
        if let Some(v) = self.transport_type {
            intent.transport_type = Some(v);
        }
        if let Some(v) = self.accommodation_level {
            intent.accommodation_level = Some(v);
        }
        if let Some(v) = self.people_count {
            intent.people_count = Some(v);
        }
    }
}

/// Per-call context shared by all passes.
#[derive(Debug, Clone, Copy)]
pub struct PassContext {
    pub today: NaiveDate,
}

/// One independent step of the extraction pipeline.
pub trait ExtractionPass: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, utterance: &mut Utterance, ctx: &PassContext, patch: &mut IntentPatch);
}

// =============================================================================
// Shared helpers
// =============================================================================

const SMALL_NUMBERS: &[(&str, u32)] = &[
    ("a", 1),
    ("an", 1),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
];

const NUMBER_WORDS: &str =
    "a|an|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen";

fn small_number(token: &str) -> Option<u32> {
    let lower = token.to_lowercase();
    if let Ok(n) = lower.parse::<u32>() {
        return Some(n);
    }
    SMALL_NUMBERS
        .iter()
        .find(|(word, _)| *word == lower)
        .map(|(_, n)| *n)
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid entity regex")
}

// =============================================================================
// (a) Duration
// =============================================================================

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    regex(&format!(
        r"(?i)\b(\d{{1,3}}|{})\s*-?\s*(days?|nights?|weeks?)\b",
        NUMBER_WORDS
    ))
});
static FORTNIGHT: LazyLock<Regex> = LazyLock::new(|| regex(r"(?i)\b(?:a\s+)?fortnight\b"));
static BARE_NUMBER: LazyLock<Regex> = LazyLock::new(|| regex(r"^\s*(\d{1,3})\s*\.?\s*$"));

pub struct DurationPass;

impl ExtractionPass for DurationPass {
    fn name(&self) -> &'static str {
        "duration"
    }

    fn run(&self, utterance: &mut Utterance, _ctx: &PassContext, patch: &mut IntentPatch) {
        let text = utterance.remaining().to_string();
        let mut found: Vec<(Range<usize>, u32)> = Vec::new();

        for caps in DURATION.captures_iter(&text) {
            let (Some(whole), Some(count), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let Some(n) = small_number(count.as_str()) else {
                continue;
            };
            let days = if unit.as_str().to_lowercase().starts_with("week") {
                n.saturating_mul(7)
            } else {
                n
            };
            found.push((whole.range(), days));
        }
        for m in FORTNIGHT.find_iter(&text) {
            found.push((m.range(), 14));
        }

        if found.is_empty() {
            if let Some(n) = BARE_NUMBER
                .captures(&text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            {
                found.push((0..text.len(), n));
            }
        }

        found.sort_by_key(|(range, _)| range.start);
        for (range, days) in found {
            if days >= 1 {
                patch.duration_days = Some(days);
            }
            utterance.consume(range);
        }
    }
}

// =============================================================================
// (a') Party size
// =============================================================================

static PEOPLE: LazyLock<Regex> = LazyLock::new(|| {
    regex(&format!(
        r"(?i)\b(\d{{1,2}}|{})\s+(?:people|persons|adults|travell?ers|guests|pax|of\s+us)\b",
        NUMBER_WORDS
    ))
});
static SOLO: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)\b(?:solo|alone|by\s+myself|just\s+me)\b"));

pub struct PeoplePass;

impl ExtractionPass for PeoplePass {
    fn name(&self) -> &'static str {
        "people"
    }

    fn run(&self, utterance: &mut Utterance, _ctx: &PassContext, patch: &mut IntentPatch) {
        let text = utterance.remaining().to_string();
        let mut found: Vec<(Range<usize>, u32)> = Vec::new();

        for caps in PEOPLE.captures_iter(&text) {
            if let (Some(whole), Some(n)) = (
                caps.get(0),
                caps.get(1).and_then(|m| small_number(m.as_str())),
            ) {
                found.push((whole.range(), n));
            }
        }
        for m in SOLO.find_iter(&text) {
            found.push((m.range(), 1));
        }

        found.sort_by_key(|(range, _)| range.start);
        for (range, n) in found {
            if n >= 1 {
                patch.people_count = Some(n);
            }
            utterance.consume(range);
        }
    }
}

// =============================================================================
// (b) Budget
// =============================================================================

/// Optional currency symbol, number with optional thousands separators and
/// decimals, optional `k` suffix. Groups: symbol, digits, suffix.
const AMOUNT: &str = r"(?:([$€£])\s?)?\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s?(k)?\b";
const AMOUNT_NO_GROUPS: &str =
    r"(?:[$€£]\s?)?\b(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s?k?\b";

static MONEY_CUE: LazyLock<Regex> = LazyLock::new(|| {
    regex(
        r"(?i)[$€£]|\b(?:budget|usd|eur|euros?|dollars?|egp|gbp|pounds?|bucks|price|cost|costs|spend|afford|under|below|max|maximum|at\s+least|minimum|up\s+to)\b|\d\s?k\b",
    )
});
static SINGLE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| regex(&format!("(?i){}", AMOUNT)));
static RANGE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    regex(&format!(
        r"(?i){a}\s*(?:-|–|to|and)\s*{a}",
        a = AMOUNT_NO_GROUPS
    ))
});
static FLOOR_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    regex(
        r"(?i)\b(?:at\s+least|minimum(?:\s+of)?|min|from|over|more\s+than|above|starting\s+(?:at|from))\s*:?\s*$",
    )
});
static CUE_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    regex(
        r"(?i)\b(?:budget(?:\s+(?:of|is|around|about|to))?|under|below|max(?:imum)?|up\s+to|less\s+than|no\s+more\s+than|around|about|roughly|between|spend(?:ing)?|afford|price|cost|costs)\s*(?:is\s+)?[:=]?\s*$",
    )
});
static CUE_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)^\s*(?:usd|eur|euros?|dollars?|egp|gbp|pounds?|bucks|budget|max|maximum|tops)\b")
});
static NOT_MONEY_AFTER: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)^\s*(?:-?\s*stars?\b|%|am\b|pm\b|st\b|nd\b|rd\b|th\b)"));

#[derive(Debug, Clone, Copy, PartialEq)]
enum BudgetSignal {
    Range(f64, f64),
    Floor(f64),
    Ceiling(f64),
}

#[derive(Debug, Clone, Copy)]
struct Amount {
    value: f64,
    /// Currency symbol or `k` suffix present.
    marked: bool,
}

fn parse_amount(caps: &regex::Captures) -> Option<Amount> {
    let digits = caps.get(2)?.as_str().replace(',', "");
    let mut value: f64 = digits.parse().ok()?;
    let k = caps.get(3).is_some();
    if k {
        value *= 1000.0;
    }
    value
        .is_finite()
        .then_some(Amount {
            value,
            marked: k || caps.get(1).is_some(),
        })
}

fn is_year_like(amount: &Amount) -> bool {
    !amount.marked && amount.value.fract() == 0.0 && (1900.0..=2100.0).contains(&amount.value)
}

pub struct BudgetPass {
    /// Accept amounts without a nearby money cue only from this value up.
    pub min_unmarked: f64,
}

impl Default for BudgetPass {
    fn default() -> Self {
        Self {
            min_unmarked: 100.0,
        }
    }
}

impl BudgetPass {
    /// Budget parsing without the money-cue requirement, used when the
    /// previous turn explicitly asked for a budget.
    pub fn answering() -> Self {
        Self { min_unmarked: 0.0 }
    }

    fn has_local_cue(text: &str, range: &Range<usize>) -> bool {
        CUE_BEFORE.is_match(&text[..range.start])
            || FLOOR_BEFORE.is_match(&text[..range.start])
            || CUE_AFTER.is_match(&text[range.end..])
    }

    fn scan(&self, text: &str) -> Vec<(Range<usize>, BudgetSignal)> {
        let mut signals = Vec::new();
        let mut rest = text.to_string();

        for m in RANGE_AMOUNT.find_iter(text) {
            let amounts: Vec<Amount> = SINGLE_AMOUNT
                .captures_iter(m.as_str())
                .filter_map(|c| parse_amount(&c))
                .collect();
            let &[lo, hi] = amounts.as_slice() else {
                continue;
            };
            let range = m.range();
            let cue = Self::has_local_cue(text, &range);
            let plain = lo.value >= self.min_unmarked && hi.value >= self.min_unmarked;
            if !(cue || lo.marked || hi.marked || plain) {
                continue;
            }
            if !cue && (is_year_like(&lo) || is_year_like(&hi)) {
                continue;
            }
            let (lo, hi) = if lo.value <= hi.value {
                (lo.value, hi.value)
            } else {
                (hi.value, lo.value)
            };
            rest.replace_range(range.clone(), &" ".repeat(range.len()));
            signals.push((range, BudgetSignal::Range(lo, hi)));
        }

        for caps in SINGLE_AMOUNT.captures_iter(&rest) {
            let (Some(whole), Some(amount)) = (caps.get(0), parse_amount(&caps)) else {
                continue;
            };
            let range = whole.range();
            if NOT_MONEY_AFTER.is_match(&rest[range.end..]) {
                continue;
            }
            let floor = FLOOR_BEFORE.is_match(&rest[..range.start]);
            let cue = floor
                || CUE_BEFORE.is_match(&rest[..range.start])
                || CUE_AFTER.is_match(&rest[range.end..]);
            if is_year_like(&amount) && !cue {
                continue;
            }
            if !(cue || amount.marked || amount.value >= self.min_unmarked) {
                continue;
            }
            let signal = if floor {
                BudgetSignal::Floor(amount.value)
            } else {
                BudgetSignal::Ceiling(amount.value)
            };
            signals.push((range, signal));
        }

        signals.sort_by_key(|(range, _)| range.start);
        signals
    }
}

impl ExtractionPass for BudgetPass {
    fn name(&self) -> &'static str {
        "budget"
    }

    fn run(&self, utterance: &mut Utterance, _ctx: &PassContext, patch: &mut IntentPatch) {
        let text = utterance.remaining().to_string();
        if self.min_unmarked > 0.0 && !MONEY_CUE.is_match(&text) {
            return;
        }

        for (range, signal) in self.scan(&text) {
            match signal {
                BudgetSignal::Range(lo, hi) => {
                    patch.budget_min = Some(lo);
                    patch.budget_max = Some(hi);
                }
                BudgetSignal::Floor(v) => patch.budget_min = Some(v),
                BudgetSignal::Ceiling(v) => patch.budget_max = Some(v),
            }
            utterance.consume(range);
        }
    }
}

// =============================================================================
// (c) Month / year
// =============================================================================

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("sept", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

static MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    let names: Vec<&str> = MONTHS.iter().map(|(name, _)| *name).collect();
    regex(&format!(
        r"(?i)\b(?:(next|this|in|for|during|by|early|late|mid|until|around)\s+)?({})\b\.?(?:\s*,?\s*((?:19|20)\d{{2}})\b)?",
        names.join("|")
    ))
});
static RELATIVE_MONTH: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)\b(next|this)\s+month\b"));
static LONE_YEAR: LazyLock<Regex> = LazyLock::new(|| regex(r"\b((?:19|20)\d{2})\b"));
static CUED_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)\b(?:in|during|by|until|around|early|late|mid|year)\s+((?:19|20)\d{2})\b")
});

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(candidate, _)| *candidate == lower)
        .map(|(_, n)| *n)
}

/// Year of the nearest occurrence of `month` that is not in the past.
pub(crate) fn upcoming_year(month: u32, today: NaiveDate) -> i32 {
    if month >= today.month() {
        today.year()
    } else {
        today.year() + 1
    }
}

pub struct DatePass;

impl ExtractionPass for DatePass {
    fn name(&self) -> &'static str {
        "date"
    }

    fn run(&self, utterance: &mut Utterance, ctx: &PassContext, patch: &mut IntentPatch) {
        let text = utterance.remaining().to_string();
        let today = ctx.today;
        let mut found: Vec<(Range<usize>, u32, i32)> = Vec::new();

        for caps in RELATIVE_MONTH.captures_iter(&text) {
            let (Some(whole), Some(which)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let (month, year) = if which.as_str().eq_ignore_ascii_case("next") {
                month_after(today)
            } else {
                (today.month(), today.year())
            };
            found.push((whole.range(), month, year));
        }

        for caps in MONTH_NAME.captures_iter(&text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let Some(month) = month_number(name.as_str()) else {
                continue;
            };
            let qualifier = caps.get(1).map(|m| m.as_str().to_lowercase());
            let explicit_year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());

            // "may" is only a month with a qualifier or a year.
            if name.as_str().eq_ignore_ascii_case("may")
                && qualifier.is_none()
                && explicit_year.is_none()
            {
                continue;
            }

            let year = match (explicit_year, qualifier.as_deref()) {
                (Some(y), _) => y,
                (None, Some("next")) if month > today.month() => today.year(),
                (None, Some("next")) => today.year() + 1,
                (None, Some("this")) => today.year(),
                (None, _) => upcoming_year(month, today),
            };
            found.push((whole.range(), month, year));
        }

        let month_named = !found.is_empty();
        found.sort_by_key(|(range, _, _)| range.start);
        for (range, month, year) in found {
            patch.month = Some(month);
            patch.year = Some(year);
            utterance.consume(range);
        }

        // A year on its own needs a date cue, or a month named alongside it.
        let rest = utterance.remaining().to_string();
        let year_pattern = if month_named { &*LONE_YEAR } else { &*CUED_YEAR };
        if let Some(m) = year_pattern
            .captures_iter(&rest)
            .last()
            .and_then(|c| c.get(1))
        {
            if let Ok(year) = m.as_str().parse::<i32>() {
                patch.year = Some(year);
                utterance.consume(m.range());
            }
        }
    }
}

// =============================================================================
// (d) Transport, (e) Accommodation
// =============================================================================

pub struct TransportPass;

impl ExtractionPass for TransportPass {
    fn name(&self) -> &'static str {
        "transport"
    }

    fn run(&self, utterance: &mut Utterance, _ctx: &PassContext, patch: &mut IntentPatch) {
        if let Some(mode) = canonical_transport(utterance.remaining()) {
            patch.transport_type = Some(mode);
        }
    }
}

pub struct AccommodationPass;

impl ExtractionPass for AccommodationPass {
    fn name(&self) -> &'static str {
        "accommodation"
    }

    fn run(&self, utterance: &mut Utterance, _ctx: &PassContext, patch: &mut IntentPatch) {
        if let Some(level) = canonical_accommodation(utterance.remaining()) {
            patch.accommodation_level = Some(level);
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// The ordered pass pipeline.
pub struct EntityExtractor {
    passes: Vec<Box<dyn ExtractionPass>>,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor {
    /// Duration, party size, budget, date, transport, accommodation.
    pub fn new() -> Self {
        Self::with_passes(vec![
            Box::new(DurationPass),
            Box::new(PeoplePass),
            Box::new(BudgetPass::default()),
            Box::new(DatePass),
            Box::new(TransportPass),
            Box::new(AccommodationPass),
        ])
    }

    pub fn with_passes(passes: Vec<Box<dyn ExtractionPass>>) -> Self {
        Self { passes }
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass over an utterance that earlier stages may already
    /// have partly consumed.
    pub fn extract_from(&self, utterance: &mut Utterance, today: NaiveDate) -> IntentPatch {
        let ctx = PassContext { today };
        let mut patch = IntentPatch::default();
        for pass in &self.passes {
            pass.run(utterance, &ctx, &mut patch);
        }
        patch
    }

    pub fn extract(&self, text: &str, today: NaiveDate) -> IntentPatch {
        self.extract_from(&mut Utterance::new(text), today)
    }
}
