//! API request and response types

use crate::extractor::{self, Presentation};
use crate::state_machine::{ConversationState, FlowStep, Phase, Turn, TurnAuthor, VisitorFields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to submit a free-text turn
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub text: String,
}

/// Request to confirm or edit a summary
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub accepted: bool,
}

/// Request to pick an offered option
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub value: String,
}

/// One transcript turn; bot turns carry their extracted options
#[derive(Debug, Serialize)]
pub struct TurnView {
    pub author: TurnAuthor,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation: Option<Presentation>,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self::new(turn, false)
    }
}

impl TurnView {
    /// `awaiting_confirmation` is only ever set for the prompt being answered
    fn new(turn: &Turn, awaiting_confirmation: bool) -> Self {
        Self {
            author: turn.author,
            text: turn.text.clone(),
            created_at: turn.created_at,
            presentation: turn
                .is_bot()
                .then(|| extractor::present(&turn.text, awaiting_confirmation)),
        }
    }
}

/// Snapshot of a session
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub transcript: Vec<TurnView>,
    pub step: FlowStep,
    pub fields: VisitorFields,
    pub busy: bool,
    pub show_confirmation: bool,
    pub phase: Phase,
}

impl SessionView {
    pub fn new(session_id: &str, state: &ConversationState) -> Self {
        let prompt = state
            .transcript()
            .iter()
            .rposition(Turn::is_bot)
            .filter(|_| state.show_confirmation);
        let transcript = state
            .transcript()
            .iter()
            .enumerate()
            .map(|(index, turn)| TurnView::new(turn, prompt == Some(index)))
            .collect();

        Self {
            session_id: session_id.to_string(),
            transcript,
            step: state.step.clone(),
            fields: state.fields.clone(),
            busy: state.is_busy(),
            show_confirmation: state.show_confirmation,
            phase: state.phase(),
        }
    }
}

/// Response for turn submission
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
