//! Pure state transition function
//!
//! Given the same state, context, event and clock reading, `transition`
//! always produces the same result. All I/O is described by the returned
//! effects and carried out by the runtime.

use super::state::{
    ConvContext, ConversationState, FlowStep, RequestId, TimerId, Turn, APOLOGY_MESSAGE,
    CLOSING_MESSAGE,
};
use super::{Effect, Event};
use crate::extractor::{confirmation_token, is_confirmation_prompt, parse_confirmation_token};
use crate::processor::{ProcessorReply, ProcessorRequest};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Rejected events. The state is left untouched in every case.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Still processing the previous message")]
    Busy,
    #[error("Message cannot be empty")]
    EmptyInput,
    #[error("Please confirm or edit the summary")]
    ConfirmationRequired,
    #[error("There is no summary awaiting confirmation")]
    NotAwaitingConfirmation,
    #[error("Discarding stale processor reply {0}")]
    StaleReply(RequestId),
    #[error("Ignoring stale reset timer {0}")]
    StaleTimer(TimerId),
}

enum Submission {
    Text(String),
    Confirmation(bool),
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    context: &ConvContext,
    event: Event,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::UserInput { text, request_id } => {
            submit(state, Submission::Text(text), request_id, now)
        }
        Event::Confirmation {
            accepted,
            request_id,
        } => submit(state, Submission::Confirmation(accepted), request_id, now),

        Event::ProcessorReplied { request_id, reply } => {
            if state.in_flight != Some(request_id) {
                return Err(TransitionError::StaleReply(request_id));
            }
            Ok(apply_reply(state, context, request_id, reply, now))
        }

        // Failure: apologise, go idle, keep step and fields exactly as they were
        Event::ProcessorFailed { request_id, .. } => {
            if state.in_flight != Some(request_id) {
                return Err(TransitionError::StaleReply(request_id));
            }
            let mut new_state = state.clone();
            let apology = Turn::bot(APOLOGY_MESSAGE, now);
            new_state.push_turn(apology.clone());
            new_state.in_flight = None;
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::publish_turn(&apology))
                .with_effect(Effect::PublishState))
        }

        Event::ResetTimerFired { timer } => {
            if state.pending_reset != Some(timer) {
                return Err(TransitionError::StaleTimer(timer));
            }
            Ok(TransitionResult::new(ConversationState::initial(now))
                .with_effect(Effect::PublishState))
        }

        Event::Reset => Ok(reset(state, now)),
    }
}

fn submit(
    state: &ConversationState,
    submission: Submission,
    request_id: RequestId,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    if state.is_busy() {
        return Err(TransitionError::Busy);
    }

    // Any input after completion starts over, whatever it says
    if state.step.is_complete() {
        return Ok(reset(state, now));
    }

    // The transcript keeps what was typed; the processor gets the canonical token
    let (text, message) = match submission {
        Submission::Text(text) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyInput);
            }
            if state.show_confirmation {
                let token = parse_confirmation_token(&text)
                    .ok_or(TransitionError::ConfirmationRequired)?;
                (text, token.to_string())
            } else {
                let message = text.clone();
                (text, message)
            }
        }
        Submission::Confirmation(accepted) => {
            if !state.show_confirmation {
                return Err(TransitionError::NotAwaitingConfirmation);
            }
            let token = confirmation_token(accepted).to_string();
            (token.clone(), token)
        }
    };

    let request = ProcessorRequest {
        message,
        current_step: state.step.clone(),
        fields: state.fields.clone(),
    };

    let mut new_state = state.clone();
    let turn = Turn::user(text, now);
    new_state.push_turn(turn.clone());
    new_state.in_flight = Some(request_id);

    Ok(TransitionResult::new(new_state)
        .with_effect(Effect::publish_turn(&turn))
        .with_effect(Effect::PublishState)
        .with_effect(Effect::CallProcessor {
            request_id,
            request,
        }))
}

fn apply_reply(
    state: &ConversationState,
    context: &ConvContext,
    request_id: RequestId,
    reply: ProcessorReply,
    now: DateTime<Utc>,
) -> TransitionResult {
    let ProcessorReply {
        response,
        next_step,
        fields,
    } = reply;

    let mut new_state = state.clone();
    new_state.fields.merge(fields);
    new_state.in_flight = None;

    let completed = new_state.fields.is_registration_completed()
        || next_step.as_ref().is_some_and(FlowStep::is_complete);

    // A reply without a next step keeps the current one
    new_state.step = if completed {
        FlowStep::complete()
    } else {
        next_step.unwrap_or_else(|| state.step.clone())
    };

    new_state.show_confirmation = !completed
        && (context.is_confirmation_step(&new_state.step) || is_confirmation_prompt(&response));

    let mut effects = Vec::new();

    let bot_turn = Turn::bot(&response, now);
    new_state.push_turn(bot_turn.clone());
    effects.push(Effect::publish_turn(&bot_turn));

    if completed {
        if !mentions_restart(&response) {
            let closing = Turn::bot(CLOSING_MESSAGE, now);
            new_state.push_turn(closing.clone());
            effects.push(Effect::publish_turn(&closing));
        }

        // Cancel-then-reschedule: never more than one armed timer
        if let Some(previous) = state.pending_reset {
            effects.push(Effect::CancelReset { timer: previous });
        }
        let timer = TimerId::from(request_id);
        new_state.pending_reset = Some(timer);
        effects.push(Effect::ScheduleReset {
            timer,
            delay: context.reset_delay,
        });
    }

    effects.push(Effect::PublishState);
    TransitionResult::new(new_state).with_effects(effects)
}

fn reset(state: &ConversationState, now: DateTime<Utc>) -> TransitionResult {
    let result = TransitionResult::new(ConversationState::initial(now));
    match state.pending_reset {
        Some(timer) => result
            .with_effect(Effect::CancelReset { timer })
            .with_effect(Effect::PublishState),
        None => result.with_effect(Effect::PublishState),
    }
}

fn mentions_restart(response: &str) -> bool {
    response
        .to_ascii_lowercase()
        .contains("start a new registration")
}
