//! Request, response and dialogue types for conversational offer search.

use serde::{Deserialize, Serialize};

use wayfarer_core::config::ChatConfig;
use wayfarer_core::types::{Intent, Offer, SortOrder, UsedRelaxations};

use crate::error::ChatError;

/// Longest accepted caller-supplied conversation id.
pub const MAX_CONVERSATION_ID_LEN: usize = 128;

// =============================================================================
// Request
// =============================================================================

/// Inbound suggestion request, exactly as the client sent it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    pub prompt: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub strict: Option<bool>,
}

impl SuggestRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Check the request against the configured limits before any pipeline
    /// work runs.
    pub fn validate(&self, config: &ChatConfig) -> Result<ValidatedRequest, ChatError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        if prompt.chars().count() > config.max_message_length {
            return Err(ChatError::InvalidRequest(format!(
                "prompt exceeds maximum length of {} characters",
                config.max_message_length
            )));
        }

        let limit = match self.limit {
            None => config.default_limit,
            Some(n) if n >= 1 && (n as u64) <= config.max_limit as u64 => n as usize,
            Some(n) => {
                return Err(ChatError::InvalidRequest(format!(
                    "limit must be between 1 and {}, got {}",
                    config.max_limit, n
                )))
            }
        };

        let sort = match self.sort.as_deref() {
            None => SortOrder::default(),
            Some(s) => s.parse::<SortOrder>()?,
        };

        let conversation_id = match self.conversation_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(id) if id.chars().count() > MAX_CONVERSATION_ID_LEN => {
                return Err(ChatError::InvalidRequest(format!(
                    "conversationId exceeds {} characters",
                    MAX_CONVERSATION_ID_LEN
                )))
            }
            Some(id) => Some(id.to_string()),
        };

        Ok(ValidatedRequest {
            prompt: prompt.to_string(),
            limit,
            sort,
            conversation_id,
            strict: self.strict.unwrap_or(false),
        })
    }
}

/// A request that passed validation, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub prompt: String,
    pub limit: usize,
    pub sort: SortOrder,
    pub conversation_id: Option<String>,
    pub strict: bool,
}

// =============================================================================
// Response
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestMeta {
    pub enough_filters: bool,
    pub used_relaxations: UsedRelaxations,
}

/// Outbound suggestion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResponse {
    pub conversation_id: String,
    pub extracted: Intent,
    pub offers: Vec<Offer>,
    pub next_question: Option<String>,
    pub meta: SuggestMeta,
}

// =============================================================================
// Dialogue slots
// =============================================================================

/// A fillable search slot, in question priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Destination,
    Budget,
    Duration,
    Transport,
    Accommodation,
    TravelDate,
}

impl Slot {
    /// All slots in the order questions are asked.
    pub const PRIORITY: [Slot; 6] = [
        Slot::Destination,
        Slot::Budget,
        Slot::Duration,
        Slot::Transport,
        Slot::Accommodation,
        Slot::TravelDate,
    ];

    /// The follow-up question posed when this slot is missing.
    pub fn question(&self) -> &'static str {
        match self {
            Slot::Destination => "Where would you like to go?",
            Slot::Budget => "Any budget range in mind?",
            Slot::Duration => "How many days would you like the trip to last?",
            Slot::Transport => "How would you prefer to travel: flight, train, or bus?",
            Slot::Accommodation => {
                "What level of accommodation do you prefer: standard, premium, or luxury?"
            }
            Slot::TravelDate => "Which month are you planning to travel?",
        }
    }

    pub fn is_filled(&self, intent: &Intent) -> bool {
        match self {
            Slot::Destination => intent.has_destination(),
            Slot::Budget => intent.has_budget(),
            Slot::Duration => intent.duration_days.is_some(),
            Slot::Transport => intent.transport_type.is_some(),
            Slot::Accommodation => intent.accommodation_level.is_some(),
            Slot::TravelDate => intent.has_date(),
        }
    }
}

/// Dialogue progress derived from slot presence on every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueStage {
    /// No conversation state exists yet.
    New,
    AwaitingDestination,
    /// Destination known but not enough secondary filters.
    AwaitingSlot,
    Ready,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChatConfig {
        ChatConfig::default()
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let json = r#"{"prompt":"Bali","limit":5,"sort":"rating:desc","conversationId":"abc","strict":true}"#;
        let req: SuggestRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.prompt, "Bali");
        assert_eq!(req.limit, Some(5));
        assert_eq!(req.conversation_id.as_deref(), Some("abc"));
        assert_eq!(req.strict, Some(true));
    }

    #[test]
    fn test_validate_applies_defaults() {
        let validated = SuggestRequest::new("  trip to Cairo  ")
            .validate(&config())
            .unwrap();
        assert_eq!(validated.prompt, "trip to Cairo");
        assert_eq!(validated.limit, 10);
        assert_eq!(validated.sort, SortOrder::PriceAsc);
        assert!(validated.conversation_id.is_none());
        assert!(!validated.strict);
    }

    #[test]
    fn test_validate_rejects_empty_prompt() {
        let err = SuggestRequest::new("   ").validate(&config()).unwrap_err();
        assert!(matches!(err, ChatError::InvalidRequest(_)));
    }

    #[test]
    fn test_validate_rejects_long_prompt() {
        let req = SuggestRequest::new("a".repeat(2001));
        assert!(matches!(
            req.validate(&config()),
            Err(ChatError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_limit_bounds() {
        for bad in [0, -3, 51] {
            let req = SuggestRequest {
                limit: Some(bad),
                ..SuggestRequest::new("Cairo")
            };
            assert!(req.validate(&config()).is_err(), "limit {} accepted", bad);
        }
        for good in [1, 50] {
            let req = SuggestRequest {
                limit: Some(good),
                ..SuggestRequest::new("Cairo")
            };
            assert_eq!(req.validate(&config()).unwrap().limit, good as usize);
        }
    }

    #[test]
    fn test_validate_rejects_unknown_sort() {
        let req = SuggestRequest {
            sort: Some("stars".to_string()),
            ..SuggestRequest::new("Cairo")
        };
        let err = req.validate(&config()).unwrap_err();
        assert!(err.to_string().contains("sort"));
    }

    #[test]
    fn test_validate_conversation_id() {
        let blank = SuggestRequest::new("Cairo").with_conversation("  ");
        assert!(blank.validate(&config()).unwrap().conversation_id.is_none());

        let too_long = SuggestRequest::new("Cairo").with_conversation("x".repeat(129));
        assert!(too_long.validate(&config()).is_err());

        let ok = SuggestRequest::new("Cairo").with_conversation("conv-1");
        assert_eq!(
            ok.validate(&config()).unwrap().conversation_id.as_deref(),
            Some("conv-1")
        );
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = SuggestResponse {
            conversation_id: "c1".to_string(),
            extracted: Intent::default(),
            offers: vec![],
            next_question: Some(Slot::Destination.question().to_string()),
            meta: SuggestMeta {
                enough_filters: false,
                used_relaxations: UsedRelaxations::default(),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["conversationId"], "c1");
        assert_eq!(json["nextQuestion"], "Where would you like to go?");
        assert_eq!(json["meta"]["enoughFilters"], false);
        assert_eq!(json["meta"]["usedRelaxations"]["dateRelaxed"], false);
        assert_eq!(json["meta"]["usedRelaxations"]["budgetRelaxed"], false);
    }

    #[test]
    fn test_slot_is_filled() {
        let mut intent = Intent::default();
        assert!(Slot::PRIORITY.iter().all(|s| !s.is_filled(&intent)));
        intent.budget_max = Some(100.0);
        intent.month = Some(3);
        assert!(Slot::Budget.is_filled(&intent));
        assert!(Slot::TravelDate.is_filled(&intent));
        assert!(!Slot::Duration.is_filled(&intent));
    }
}
