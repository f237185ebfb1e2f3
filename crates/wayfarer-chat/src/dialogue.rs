//! Dialogue state management.
//!
//! Merges each turn's extraction into the accumulated intent, decides which
//! slot to ask about next, interprets direct answers to the pending
//! question, and keeps per-conversation state behind per-key locks with an
//! idle TTL.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use wayfarer_core::types::Intent;

use crate::entities::{
    upcoming_year, BudgetPass, DatePass, DurationPass, ExtractionPass, IntentPatch, PassContext,
    PeoplePass, Utterance,
};
use crate::error::ChatError;
use crate::heuristic::{place_words, HeuristicExtractor};
use crate::matcher::{canonical_accommodation, canonical_transport, mask_vocabulary};
use crate::types::{DialogueStage, Slot};

/// Secondary slots that must be known, besides the destination, before a
/// search counts as well specified.
const MIN_SECONDARY_SLOTS: usize = 2;

// =============================================================================
// Merge and slot bookkeeping
// =============================================================================

/// Merge a new extraction over the prior intent. Present fields override,
/// absent fields fall back, lists are replaced only when the new one is
/// non-empty.
pub fn merge_intents(prior: &Intent, new: &Intent) -> Intent {
    fn pick<T: Clone>(new: &Option<T>, prior: &Option<T>) -> Option<T> {
        new.clone().or_else(|| prior.clone())
    }
    fn pick_list(new: &[String], prior: &[String]) -> Vec<String> {
        if new.is_empty() {
            prior.to_vec()
        } else {
            new.to_vec()
        }
    }

    Intent {
        destination: pick(&new.destination, &prior.destination),
        country: pick(&new.country, &prior.country),
        continent: pick(&new.continent, &prior.continent),
        budget_min: pick(&new.budget_min, &prior.budget_min),
        budget_max: pick(&new.budget_max, &prior.budget_max),
        duration_days: pick(&new.duration_days, &prior.duration_days),
        month: pick(&new.month, &prior.month),
        year: pick(&new.year, &prior.year),
        transport_type: pick(&new.transport_type, &prior.transport_type),
        accommodation_level: pick(&new.accommodation_level, &prior.accommodation_level),
        people_count: pick(&new.people_count, &prior.people_count),
        must_include: pick_list(&new.must_include, &prior.must_include),
        nice_to_have: pick_list(&new.nice_to_have, &prior.nice_to_have),
        notes: pick(&new.notes, &prior.notes),
    }
}

/// Settle a budget that this turn left inverted.
///
/// When only one bound changed and it crossed the other, the untouched
/// bound came from an earlier turn and no longer applies, so it is
/// dropped. An inverted pair stated in one turn is left for the
/// normalizer to reorder.
pub fn reconcile_budget(prior: &Intent, intent: &mut Intent) {
    let (Some(min), Some(max)) = (intent.budget_min, intent.budget_max) else {
        return;
    };
    if min <= max {
        return;
    }
    let min_changed = intent.budget_min != prior.budget_min;
    let max_changed = intent.budget_max != prior.budget_max;
    match (min_changed, max_changed) {
        (false, true) => intent.budget_min = None,
        (true, false) => intent.budget_max = None,
        _ => {}
    }
}

/// The single slot to ask about next, if any.
pub fn next_slot(intent: &Intent) -> Option<Slot> {
    Slot::PRIORITY
        .iter()
        .copied()
        .find(|slot| !slot.is_filled(intent))
}

pub fn enough_filters(intent: &Intent) -> bool {
    if !intent.has_destination() {
        return false;
    }
    let secondary = Slot::PRIORITY
        .iter()
        .filter(|slot| **slot != Slot::Destination && slot.is_filled(intent))
        .count();
    secondary >= MIN_SECONDARY_SLOTS
}

/// Stage of a conversation given its accumulated intent, `None` when no
/// state exists yet.
pub fn stage_of(intent: Option<&Intent>) -> DialogueStage {
    match intent {
        None => DialogueStage::New,
        Some(intent) if !intent.has_destination() => DialogueStage::AwaitingDestination,
        Some(intent) if enough_filters(intent) => DialogueStage::Ready,
        Some(_) => DialogueStage::AwaitingSlot,
    }
}

// =============================================================================
// Targeted answers
// =============================================================================

static STANDALONE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(])(\d{1,3})(?:$|[\s.,!?)])").expect("Invalid number regex")
});

static BARE_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})\s*\.?\s*$").expect("Invalid month regex"));

/// Leading words that carry no place name ("maybe", "I think", ...).
const DESTINATION_FILLERS: &[&str] = &[
    "maybe", "probably", "perhaps", "um", "uh", "hmm", "well", "ok", "okay", "so", "i", "i'd",
    "id", "i'm", "im", "think", "guess", "let's", "lets", "try", "go", "how", "what", "like",
    "definitely", "possibly", "just", "yes", "yeah", "sure", "please", "want", "would", "love",
    "prefer", "rather", "really", "thanks", "thank", "you",
];

/// Answers that decline to name a place.
const DESTINATION_REFUSALS: &[&str] = &[
    "no", "not", "nope", "dunno", "idk", "anywhere", "any", "nowhere", "surprise", "whatever",
    "unsure", "none", "don't", "dont",
];

/// Words that never belong to a place name; a candidate ends before the
/// first of them.
const NOT_PLACE_WORDS: &[&str] = &[
    "a", "an", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "couple", "few", "several", "day", "days", "night", "nights", "week", "weeks", "weekend",
    "fortnight", "month", "months", "year", "years", "trip", "holiday", "vacation", "something",
    "anything", "somewhere", "someplace", "place", "warm", "hot", "cold", "sunny", "cheap",
    "nice", "quiet", "relaxing", "beach", "beaches", "city", "mountains", "people", "adults",
    "kids", "family", "friends", "hotel", "budget", "money", "please", "thanks",
];

/// Interpret the utterance as a direct answer to the question asked on the
/// previous turn. Consumes what it recognises and returns whether the slot
/// was filled.
pub fn apply_targeted_answer(
    slot: Slot,
    utterance: &mut Utterance,
    intent: &mut Intent,
    today: NaiveDate,
) -> bool {
    let ctx = PassContext { today };
    let mut patch = IntentPatch::default();

    match slot {
        Slot::Destination => {
            // The extractor may already have found one this turn.
            if intent.has_destination() {
                return true;
            }
            let place = destination_answer(utterance, &ctx, &mut patch);
            patch.apply_to(intent);
            return match place {
                Some(place) => {
                    intent.destination = Some(place);
                    true
                }
                None => false,
            };
        }
        Slot::Budget => {
            // Day counts and party sizes first, so "7 days" is not a price.
            if !is_plain_amount(utterance.remaining()) {
                DurationPass.run(utterance, &ctx, &mut patch);
                PeoplePass.run(utterance, &ctx, &mut patch);
            }
            BudgetPass::answering().run(utterance, &ctx, &mut patch);
        }
        Slot::Duration => {
            DurationPass.run(utterance, &ctx, &mut patch);
            if patch.duration_days.is_none() {
                let text = utterance.remaining().to_string();
                if let Some(m) = STANDALONE_NUMBER.captures(&text).and_then(|c| c.get(1)) {
                    if let Ok(days) = m.as_str().parse::<u32>() {
                        if (1..=365).contains(&days) {
                            patch.duration_days = Some(days);
                            utterance.consume(m.range());
                        }
                    }
                }
            }
        }
        Slot::Transport => {
            patch.transport_type = canonical_transport(utterance.remaining());
        }
        Slot::Accommodation => {
            patch.accommodation_level = canonical_accommodation(utterance.remaining());
        }
        Slot::TravelDate => {
            DatePass.run(utterance, &ctx, &mut patch);
            if patch.month.is_none() {
                let text = utterance.remaining().to_string();
                if let Some(m) = BARE_MONTH.captures(&text).and_then(|c| c.get(1)) {
                    if let Ok(month) = m.as_str().parse::<u32>() {
                        if (1..=12).contains(&month) {
                            patch.month = Some(month);
                            patch.year = Some(upcoming_year(month, today));
                            utterance.consume(m.range());
                        }
                    }
                }
            }
        }
    }

    patch.apply_to(intent);
    slot.is_filled(intent) && !patch.is_empty()
}

/// A reply that is nothing but a number, like "500" or "1,200".
fn is_plain_amount(text: &str) -> bool {
    let text = text.trim().trim_end_matches('.');
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
}

/// Read a place name out of a reply to the destination question.
///
/// An explicit "to <place>" wins. Otherwise duration, party size, budget
/// and date mentions are consumed into `patch`, transport and accommodation
/// keywords are masked, and what is left must start with a short run of
/// place words.
fn destination_answer(
    utterance: &mut Utterance,
    ctx: &PassContext,
    patch: &mut IntentPatch,
) -> Option<String> {
    let text = utterance.remaining().to_string();
    if let Some(place) = HeuristicExtractor::new().extract(&text, ctx.today).destination {
        if let Some(start) = text.find(place.as_str()) {
            utterance.consume(start..start + place.len());
        }
        return Some(place);
    }

    DurationPass.run(utterance, ctx, patch);
    PeoplePass.run(utterance, ctx, patch);
    BudgetPass::default().run(utterance, ctx, patch);
    DatePass.run(utterance, ctx, patch);
    if utterance.is_exhausted() {
        return None;
    }

    // Same byte length as the utterance, so spans map back one to one.
    let text = mask_vocabulary(utterance.remaining());
    let mut rest = text.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    loop {
        let word_end = rest
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(rest.len());
        let word = rest[..word_end].to_lowercase();
        if word.is_empty() || DESTINATION_REFUSALS.contains(&word.as_str()) {
            return None;
        }
        if !DESTINATION_FILLERS.contains(&word.as_str()) {
            break;
        }
        rest = rest[word_end..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }

    let words: Vec<&str> = place_words(rest)
        .into_iter()
        .take_while(|w| !NOT_PLACE_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    let (first, last) = (words.first()?, words.last()?);
    let start = text.len() - rest.len();
    let span_start = start + (first.as_ptr() as usize - rest.as_ptr() as usize);
    let span_end = start + (last.as_ptr() as usize - rest.as_ptr() as usize) + last.len();
    let place = text[span_start..span_end].to_string();
    utterance.consume(span_start..span_end);
    Some(place)
}

/// Give a known month a year: a month without a year resolves to its next
/// occurrence, and a month/year already in the past rolls forward.
pub fn resolve_travel_date(intent: &mut Intent, today: NaiveDate) {
    let Some(month) = intent.month else {
        return;
    };
    let upcoming = upcoming_year(month, today);
    match intent.year {
        None => intent.year = Some(upcoming),
        Some(year) if (year, month) < (today.year(), today.month()) => {
            intent.year = Some(upcoming);
        }
        Some(_) => {}
    }
}

// =============================================================================
// Conversation store
// =============================================================================

/// Accumulated state of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub intent: Intent,
    /// Slot asked about on the previous turn.
    pub pending: Option<Slot>,
    pub turns: u32,
    pub updated_at: Instant,
}

impl ConversationState {
    pub fn fresh() -> Self {
        Self {
            intent: Intent::default(),
            pending: None,
            turns: 0,
            updated_at: Instant::now(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.turns == 0
    }

    pub fn stage(&self) -> DialogueStage {
        if self.is_new() {
            stage_of(None)
        } else {
            stage_of(Some(&self.intent))
        }
    }

    /// Record a completed turn.
    pub fn advance(&mut self, intent: Intent, pending: Option<Slot>) {
        self.intent = intent;
        self.pending = pending;
        self.turns = self.turns.saturating_add(1);
        self.updated_at = Instant::now();
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.updated_at) >= ttl
    }
}

type Entry = Arc<AsyncMutex<ConversationState>>;

/// Process-lifetime conversation store.
///
/// Each conversation has its own async mutex, held by a request for the
/// whole turn, so turns of one conversation run one at a time while
/// different conversations never contend. State idle for longer than the
/// TTL is treated as absent.
#[derive(Debug)]
pub struct ConversationStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lock the state for `id`, creating it when absent and resetting it
    /// when expired. The guard must be held until the turn is persisted.
    pub async fn checkout(&self, id: &str) -> Result<OwnedMutexGuard<ConversationState>, ChatError> {
        let entry = {
            let mut entries = self.entries.lock().map_err(|_| {
                ChatError::Storage("conversation store lock poisoned".to_string())
            })?;
            entries
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(ConversationState::fresh())))
                .clone()
        };

        let mut guard = entry.lock_owned().await;
        if !guard.is_new() && guard.is_expired(self.ttl, Instant::now()) {
            debug!(conversation_id = id, "Conversation expired, starting fresh");
            *guard = ConversationState::fresh();
        }
        Ok(guard)
    }

    /// Drop idle conversations nobody is using. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| {
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            match entry.try_lock() {
                Ok(state) => !state.is_expired(self.ttl, now),
                Err(_) => true,
            }
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
