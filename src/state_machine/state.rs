//! Conversation state types

use crate::directory::{GroupMember, ScheduledMeeting};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// First bot turn of every session
pub const WELCOME_MESSAGE: &str = "Welcome! I am your AI receptionist. Please select your visitor type:\n\n1. I am here as a guest\n2. I am a vendor\n3. I am here for a pre-scheduled meeting";

/// Appended once a registration completes
pub const CLOSING_MESSAGE: &str = "Type ok to start a new registration.";

/// Shown when the message processor cannot be reached
pub const APOLOGY_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Default delay before a completed session resets itself
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(5);

// ============================================================================
// Turns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnAuthor {
    User,
    Bot,
}

/// One message in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub author: TurnAuthor,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            author: TurnAuthor::User,
            text: text.into(),
            created_at: now,
        }
    }

    pub fn bot(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            author: TurnAuthor::Bot,
            text: text.into(),
            created_at: now,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.author == TurnAuthor::Bot
    }
}

// ============================================================================
// Flow steps and ids
// ============================================================================

/// Opaque stage name. Only `complete` and the configured confirmation steps
/// mean anything to the controller; the processor owns the rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowStep(String);

impl FlowStep {
    pub const VISITOR_TYPE: &'static str = "visitor_type";
    pub const CONFIRMATION: &'static str = "confirmation";
    pub const COMPLETE: &'static str = "complete";

    pub fn new(step: impl Into<String>) -> Self {
        Self(step.into())
    }

    pub fn visitor_type() -> Self {
        Self::new(Self::VISITOR_TYPE)
    }

    pub fn confirmation() -> Self {
        Self::new(Self::CONFIRMATION)
    }

    pub fn complete() -> Self {
        Self::new(Self::COMPLETE)
    }

    pub fn is_complete(&self) -> bool {
        self.0 == Self::COMPLETE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one processor call. Allocated by the runtime, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Identifies one scheduled auto-reset. Derived from the request that
/// completed the registration, so it is unique for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(pub u64);

impl From<RequestId> for TimerId {
    fn from(id: RequestId) -> Self {
        TimerId(id.0)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reset-{}", self.0)
    }
}

// ============================================================================
// Visitor fields
// ============================================================================

/// Host candidate returned by the employee directory lookup
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeMatch {
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub email: String,
    pub department: String,
    #[serde(rename = "jobTitle")]
    pub job_title: String,
    /// Directory ids arrive as strings or numbers
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => value,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Partial visitor record accumulated across turns.
///
/// Fields are only ever overwritten, never cleared: see [`VisitorFields::merge`].
/// A value that does not fit its typed field is kept verbatim in `extra`
/// under the same key rather than failing the whole record.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VisitorFields {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub visitor_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Confirmed host name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Host name as the visitor typed it, before matching
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_requested: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_meeting: Option<ScheduledMeeting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_group_visit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_members: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_members: Option<Vec<GroupMember>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_matches: Option<Vec<EmployeeMatch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_selection_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_completed: Option<bool>,
    /// Processor-owned keys the controller does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Invokes `$apply!` with every typed field and its wire key
macro_rules! typed_fields {
    ($apply:ident!($($args:tt)*)) => {
        $apply!(
            $($args)*;
            visitor_type => "type",
            full_name => "full_name",
            cnic => "cnic",
            phone => "phone",
            email => "email",
            host => "host",
            host_requested => "host_requested",
            host_email => "host_email",
            purpose => "purpose",
            verification_status => "verification_status",
            supplier => "supplier",
            scheduled_time => "scheduled_time",
            scheduled_meeting => "scheduled_meeting",
            is_group_visit => "is_group_visit",
            group_id => "group_id",
            total_members => "total_members",
            group_members => "group_members",
            employee_matches => "employee_matches",
            employee_selection_mode => "employee_selection_mode",
            registration_completed => "registration_completed",
        )
    };
}

macro_rules! take_typed {
    ($raw:ident, $fields:ident; $($field:ident => $key:literal),+ $(,)?) => {
        $(
            if let Some(value) = $raw.remove($key) {
                match Deserialize::deserialize(&value) {
                    Ok(parsed) => $fields.$field = parsed,
                    Err(err) => {
                        tracing::debug!(field = $key, error = %err, "Keeping visitor field as raw value");
                        $fields.extra.insert($key.to_string(), value);
                    }
                }
            }
        )+
    };
}

macro_rules! overwrite_set_fields {
    ($target:expr, $source:expr; $($field:ident => $key:literal),+ $(,)?) => {
        $(
            if let Some(value) = $source.$field {
                $target.$field = Some(value);
                $target.extra.remove($key);
            } else if $source.extra.get($key).is_some_and(|raw| !raw.is_null()) {
                // Raw value lands in `extra` below and replaces the typed one
                $target.$field = None;
            }
        )+
    };
}

impl<'de> Deserialize<'de> for VisitorFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
        let mut fields = VisitorFields::default();
        typed_fields!(take_typed!(raw, fields));
        fields.extra.extend(raw);
        Ok(fields)
    }
}

impl VisitorFields {
    /// Shallow merge: every field `other` supplies replaces ours, everything
    /// else is kept. `null` extras count as not supplied.
    pub fn merge(&mut self, other: VisitorFields) {
        typed_fields!(overwrite_set_fields!(self, other));
        for (key, value) in other.extra {
            if !value.is_null() {
                self.extra.insert(key, value);
            }
        }
    }

    pub fn is_registration_completed(&self) -> bool {
        self.registration_completed == Some(true)
    }
}

// ============================================================================
// Conversation state
// ============================================================================

/// Coarse phase derived from the state, for clients and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Collecting,
    AwaitingConfirmation,
    Complete,
}

/// Everything one kiosk conversation knows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationState {
    transcript: Vec<Turn>,
    pub step: FlowStep,
    pub fields: VisitorFields,
    /// The single outstanding processor call, if any. Busy iff `Some`.
    pub in_flight: Option<RequestId>,
    pub show_confirmation: bool,
    /// The single scheduled auto-reset, if any
    pub pending_reset: Option<TimerId>,
}

impl ConversationState {
    /// Fresh session: one welcome turn, step `visitor_type`
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            transcript: vec![Turn::bot(WELCOME_MESSAGE, now)],
            step: FlowStep::visitor_type(),
            fields: VisitorFields::default(),
            in_flight: None,
            show_confirmation: false,
            pending_reset: None,
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Transcript is append-only; this is the only way to grow it.
    pub(crate) fn push_turn(&mut self, turn: Turn) {
        self.transcript.push(turn);
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn phase(&self) -> Phase {
        if self.step.is_complete() {
            Phase::Complete
        } else if self.show_confirmation {
            Phase::AwaitingConfirmation
        } else {
            Phase::Collecting
        }
    }

    /// Most recent bot turn, which is the prompt the visitor is answering
    pub fn latest_prompt(&self) -> Option<&Turn> {
        self.transcript.iter().rev().find(|turn| turn.is_bot())
    }
}

/// Per-session configuration (immutable)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub session_id: String,
    pub reset_delay: Duration,
    pub confirmation_steps: Vec<FlowStep>,
}

impl ConvContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            reset_delay: DEFAULT_RESET_DELAY,
            confirmation_steps: vec![FlowStep::confirmation()],
        }
    }

    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    pub fn with_confirmation_steps(mut self, steps: Vec<FlowStep>) -> Self {
        self.confirmation_steps = steps;
        self
    }

    pub fn is_confirmation_step(&self, step: &FlowStep) -> bool {
        self.confirmation_steps.contains(step)
    }
}
