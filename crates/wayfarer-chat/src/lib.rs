//! Conversational offer search for Wayfarer.
//!
//! Turns free-form trip requests into structured filters, keeps per-conversation
//! dialogue state to fill missing slots over several turns, and searches the
//! offer catalog with a fixed relaxation ladder when strict filters find
//! nothing.

pub mod catalog;
pub mod dialogue;
pub mod entities;
pub mod error;
pub mod heuristic;
pub mod llm;
pub mod matcher;
pub mod normalizer;
pub mod orchestrator;
pub mod query;
pub mod types;

pub use catalog::{OfferCatalog, SqliteCatalog};
pub use dialogue::{ConversationState, ConversationStore};
pub use entities::{EntityExtractor, ExtractionPass, IntentPatch, Utterance};
pub use error::ChatError;
pub use heuristic::HeuristicExtractor;
pub use llm::{IntentExtractor, LlmIntentExtractor};
pub use matcher::{fuzzy_match, levenshtein};
pub use normalizer::normalize_payload;
pub use orchestrator::SuggestService;
pub use query::{build_query, RelaxationEngine};
pub use types::{
    DialogueStage, Slot, SuggestMeta, SuggestRequest, SuggestResponse, ValidatedRequest,
};
