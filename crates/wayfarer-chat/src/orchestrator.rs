//! Suggestion orchestrator: wires extraction, dialogue state and search into
//! one conversational turn.
//!
//! Per turn: validate, lock the conversation, extract (language model with
//! heuristic fallback), normalize, merge with prior state, read the reply to
//! the pending question, mine the rest of the utterance, match the
//! destination against catalog vocabulary, pick the next question, search
//! with relaxation, and persist.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};
use uuid::Uuid;

use wayfarer_core::config::{ChatConfig, WayfarerConfig};
use wayfarer_core::types::{Intent, UsedRelaxations};

use crate::catalog::OfferCatalog;
use crate::dialogue::{
    apply_targeted_answer, enough_filters, merge_intents, next_slot, reconcile_budget,
    resolve_travel_date, stage_of, ConversationStore,
};
use crate::entities::{EntityExtractor, Utterance};
use crate::error::{with_timeout, ChatError};
use crate::heuristic::HeuristicExtractor;
use crate::llm::IntentExtractor;
use crate::matcher::fuzzy_match_with_threshold;
use crate::normalizer::{normalize_payload, sanitize_intent};
use crate::query::{build_query, RelaxationEngine};
use crate::types::{SuggestMeta, SuggestRequest, SuggestResponse};

/// Central coordinator for conversational offer search.
pub struct SuggestService {
    config: ChatConfig,
    llm_timeout: Duration,
    catalog_timeout: Duration,
    catalog: Arc<dyn OfferCatalog>,
    extractor: Option<Arc<dyn IntentExtractor>>,
    heuristic: HeuristicExtractor,
    entities: EntityExtractor,
    engine: RelaxationEngine,
    conversations: ConversationStore,
}

impl SuggestService {
    /// Create a service over `catalog` with heuristic extraction only.
    pub fn new(config: &WayfarerConfig, catalog: Arc<dyn OfferCatalog>) -> Self {
        let catalog_timeout = Duration::from_millis(config.catalog.query_timeout_ms);
        let ttl = Duration::from_secs(config.chat.session_ttl_minutes.saturating_mul(60));
        Self {
            config: config.chat.clone(),
            llm_timeout: Duration::from_millis(config.llm.timeout_ms),
            catalog_timeout,
            catalog,
            extractor: None,
            heuristic: HeuristicExtractor::new(),
            entities: EntityExtractor::new(),
            engine: RelaxationEngine::new(config.chat.budget_relax_factor, catalog_timeout),
            conversations: ConversationStore::new(ttl),
        }
    }

    /// Use a language-model extractor as the first pass.
    pub fn with_extractor(mut self, extractor: Arc<dyn IntentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn has_extractor(&self) -> bool {
        self.extractor.is_some()
    }

    /// Handle one turn, dated today in local time.
    pub async fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse, ChatError> {
        self.suggest_on(request, Local::now().date_naive()).await
    }

    /// Handle one turn as if today were `today`.
    pub async fn suggest_on(
        &self,
        request: &SuggestRequest,
        today: NaiveDate,
    ) -> Result<SuggestResponse, ChatError> {
        let request = request.validate(&self.config)?;
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Held until the turn is persisted, so turns of one conversation
        // never interleave.
        let mut state = self.conversations.checkout(&conversation_id).await?;
        let stage_before = state.stage();

        let extracted = self.first_pass(&request.prompt, today).await;
        let mut intent = merge_intents(&state.intent, &extracted);

        let mut utterance = Utterance::new(&request.prompt);
        if let Some(slot) = state.pending {
            let answered = apply_targeted_answer(slot, &mut utterance, &mut intent, today);
            debug!(conversation_id = %conversation_id, ?slot, answered, "Targeted answer");
        }
        self.entities
            .extract_from(&mut utterance, today)
            .apply_to(&mut intent);

        reconcile_budget(&state.intent, &mut intent);
        let mut intent = sanitize_intent(intent);
        resolve_travel_date(&mut intent, today);
        self.match_vocabulary(&mut intent).await;

        let next = next_slot(&intent);
        let enough = enough_filters(&intent);

        let (offers, used_relaxations) = if intent.has_destination() {
            let query = build_query(&intent, request.sort, request.limit);
            self.engine
                .search(self.catalog.as_ref(), &query, request.strict)
                .await
        } else {
            (Vec::new(), UsedRelaxations::default())
        };

        state.advance(intent.clone(), next);

        info!(
            conversation_id = %conversation_id,
            turn = state.turns,
            stage_before = ?stage_before,
            stage = ?stage_of(Some(&intent)),
            offers = offers.len(),
            enough_filters = enough,
            date_relaxed = used_relaxations.date_relaxed,
            budget_relaxed = used_relaxations.budget_relaxed,
            "Suggestion served"
        );

        Ok(SuggestResponse {
            conversation_id,
            extracted: intent,
            offers,
            next_question: next.map(|slot| slot.question().to_string()),
            meta: SuggestMeta {
                enough_filters: enough,
                used_relaxations,
            },
        })
    }

    /// Language-model extraction bounded by the configured timeout, falling
    /// back to the heuristic extractor on any failure.
    async fn first_pass(&self, prompt: &str, today: NaiveDate) -> Intent {
        if let Some(extractor) = &self.extractor {
            match with_timeout(self.llm_timeout, extractor.extract(prompt)).await {
                Ok(payload) => return normalize_payload(&payload),
                Err(e) => {
                    warn!(error = %e, "LLM extraction failed, using heuristic");
                }
            }
        }
        sanitize_intent(self.heuristic.extract(prompt, today))
    }

    /// Replace the destination with its closest catalog spelling, keeping
    /// the user's text when nothing is close enough.
    async fn match_vocabulary(&self, intent: &mut Intent) {
        let Some(destination) = intent.destination.as_deref() else {
            return;
        };

        let lookup = self.catalog.vocabulary(self.config.vocabulary_size);
        let vocabulary = match with_timeout(self.catalog_timeout, lookup).await {
            Ok(vocabulary) => vocabulary,
            Err(e) => {
                warn!(error = %e, "Vocabulary lookup failed");
                return;
            }
        };

        if let Some(matched) =
            fuzzy_match_with_threshold(destination, &vocabulary, self.config.fuzzy_threshold)
        {
            if matched != destination {
                debug!(from = %destination, to = %matched, "Destination matched to catalog");
            }
            intent.destination = Some(matched.to_string());
        }
    }
}
