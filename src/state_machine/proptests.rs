//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::processor::{ProcessorReply, ProcessorRequest};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new("kiosk-prop")
}

fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Deterministic stand-in for the message processor
fn stub_processor(request: &ProcessorRequest) -> ProcessorReply {
    let (response, next_step, fields) = match request.current_step.as_str() {
        "visitor_type" => (
            "What is your full name?",
            Some("full_name"),
            VisitorFields {
                visitor_type: Some("guest".to_string()),
                ..VisitorFields::default()
            },
        ),
        "full_name" => (
            "Please review your details and confirm.",
            Some("confirmation"),
            VisitorFields {
                full_name: Some(request.message.clone()),
                ..VisitorFields::default()
            },
        ),
        "confirmation" if request.message == "confirm" => (
            "You are registered.",
            Some("complete"),
            VisitorFields {
                registration_completed: Some(true),
                ..VisitorFields::default()
            },
        ),
        "confirmation" => (
            "What is your full name?",
            Some("full_name"),
            VisitorFields::default(),
        ),
        _ => ("Sorry, could you repeat that?", None, VisitorFields::default()),
    };
    ProcessorReply {
        response: response.to_string(),
        next_step: next_step.map(FlowStep::new),
        fields,
    }
}

#[derive(Debug, Clone)]
enum Action {
    Input(String),
    Confirm(bool),
    Reply,
    Fail,
    FireTimer,
    Reset,
}

/// Drives the pure transition function the way the runtime does, tracking
/// the outstanding processor call and the armed timers.
struct Simulation {
    state: ConversationState,
    clock: DateTime<Utc>,
    next_id: u64,
    outstanding: Option<(RequestId, ProcessorRequest)>,
    armed: HashSet<TimerId>,
}

impl Simulation {
    fn new() -> Self {
        Self {
            state: ConversationState::initial(epoch()),
            clock: epoch(),
            next_id: 1,
            outstanding: None,
            armed: HashSet::new(),
        }
    }

    fn event_for(&mut self, action: &Action) -> Event {
        match action {
            Action::Input(text) => {
                self.next_id += 1;
                Event::UserInput {
                    text: text.clone(),
                    request_id: RequestId(self.next_id),
                }
            }
            Action::Confirm(accepted) => {
                self.next_id += 1;
                Event::Confirmation {
                    accepted: *accepted,
                    request_id: RequestId(self.next_id),
                }
            }
            Action::Reply => match self.outstanding.take() {
                Some((request_id, request)) => Event::ProcessorReplied {
                    request_id,
                    reply: stub_processor(&request),
                },
                None => Event::ProcessorReplied {
                    request_id: RequestId(999_999),
                    reply: stub_processor(&ProcessorRequest {
                        message: String::new(),
                        current_step: FlowStep::new("unknown"),
                        fields: VisitorFields::default(),
                    }),
                },
            },
            Action::Fail => {
                let request_id = self
                    .outstanding
                    .take()
                    .map_or(RequestId(999_999), |(id, _)| id);
                Event::ProcessorFailed {
                    request_id,
                    message: "connection refused".to_string(),
                }
            }
            Action::FireTimer => {
                let timer = self.armed.iter().next().copied().unwrap_or(TimerId(888_888));
                Event::ResetTimerFired { timer }
            }
            Action::Reset => Event::Reset,
        }
    }

    fn step(&mut self, action: &Action) -> Result<TransitionResult, TransitionError> {
        self.clock += ChronoDuration::seconds(1);
        let event = self.event_for(action);
        let fired = match &event {
            Event::ResetTimerFired { timer } => Some(*timer),
            _ => None,
        };

        let result = transition(&self.state, &test_context(), event, self.clock)?;
        self.state = result.new_state.clone();

        if let Some(timer) = fired {
            self.armed.remove(&timer);
        }
        for effect in &result.effects {
            match effect {
                Effect::CallProcessor {
                    request_id,
                    request,
                } => self.outstanding = Some((*request_id, request.clone())),
                Effect::ScheduleReset { timer, .. } => {
                    self.armed.insert(*timer);
                }
                Effect::CancelReset { timer } => {
                    self.armed.remove(timer);
                }
                Effect::PublishTurn { .. } | Effect::PublishState => {}
            }
        }
        Ok(result)
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_input_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("1".to_string()),
        Just("confirm".to_string()),
        Just("edit".to_string()),
        Just("ok".to_string()),
        "[a-zA-Z ]{1,12}",
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => arb_input_text().prop_map(Action::Input),
        1 => any::<bool>().prop_map(Action::Confirm),
        3 => Just(Action::Reply),
        1 => Just(Action::Fail),
        1 => Just(Action::FireTimer),
        1 => Just(Action::Reset),
    ]
}

fn arb_optional_text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-zA-Z0-9]{1,8}")
}

fn arb_fields() -> impl Strategy<Value = VisitorFields> {
    (
        arb_optional_text(),
        arb_optional_text(),
        arb_optional_text(),
        arb_optional_text(),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(full_name, phone, host, purpose, is_group_visit)| VisitorFields {
            full_name,
            phone,
            host,
            purpose,
            is_group_visit,
            ..VisitorFields::default()
        })
}

fn is_initial(state: &ConversationState) -> bool {
    state.transcript().len() == 1
        && state.transcript()[0].text == WELCOME_MESSAGE
        && state.step == FlowStep::visitor_type()
        && state.fields == VisitorFields::default()
        && !state.is_busy()
        && !state.show_confirmation
        && state.pending_reset.is_none()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Transcript only grows (or restarts from the welcome turn on reset),
    // and turns stay in submission order.
    #[test]
    fn prop_transcript_append_only(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut sim = Simulation::new();
        for action in actions {
            let before = sim.state.clone();
            if let Ok(result) = sim.step(&action) {
                let after = &result.new_state;
                if !is_initial(after) {
                    prop_assert!(after.transcript().len() >= before.transcript().len());
                    prop_assert_eq!(&after.transcript()[..before.transcript().len()], before.transcript());
                }
                let stamps: Vec<_> = after.transcript().iter().map(|t| t.created_at).collect();
                prop_assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }

    // Rejected events never change the state
    #[test]
    fn prop_rejections_leave_state_untouched(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut sim = Simulation::new();
        for action in actions {
            let before = sim.state.clone();
            if sim.step(&action).is_err() {
                prop_assert_eq!(&sim.state, &before);
            }
        }
    }

    // Busy rejects every submission without asking the processor
    #[test]
    fn prop_busy_submission_is_noop(text in arb_input_text(), accepted in any::<bool>(), id in 2u64..100) {
        let ctx = test_context();
        let busy = transition(
            &ConversationState::initial(epoch()),
            &ctx,
            Event::UserInput { text: "1".to_string(), request_id: RequestId(1) },
            epoch(),
        ).unwrap().new_state;

        let err = transition(&busy, &ctx, Event::UserInput { text, request_id: RequestId(id) }, epoch());
        prop_assert_eq!(err.unwrap_err(), TransitionError::Busy);

        let err = transition(&busy, &ctx, Event::Confirmation { accepted, request_id: RequestId(id) }, epoch());
        prop_assert_eq!(err.unwrap_err(), TransitionError::Busy);
    }

    // Shallow merge: supplied fields win, the rest persist
    #[test]
    fn prop_reply_merges_shallowly(prior in arb_fields(), update in arb_fields()) {
        let ctx = test_context();
        let mut state = ConversationState::initial(epoch());
        state.fields = prior.clone();
        let busy = transition(
            &state,
            &ctx,
            Event::UserInput { text: "hi".to_string(), request_id: RequestId(1) },
            epoch(),
        ).unwrap().new_state;

        let result = transition(
            &busy,
            &ctx,
            Event::ProcessorReplied {
                request_id: RequestId(1),
                reply: ProcessorReply {
                    response: "next".to_string(),
                    next_step: Some(FlowStep::new("phone")),
                    fields: update.clone(),
                },
            },
            epoch(),
        ).unwrap();

        let merged = result.new_state.fields;
        prop_assert_eq!(merged.full_name, update.full_name.or(prior.full_name));
        prop_assert_eq!(merged.phone, update.phone.or(prior.phone));
        prop_assert_eq!(merged.host, update.host.or(prior.host));
        prop_assert_eq!(merged.purpose, update.purpose.or(prior.purpose));
        prop_assert_eq!(merged.is_group_visit, update.is_group_visit.or(prior.is_group_visit));
    }

    // Failure: exactly one apology, step and fields untouched
    #[test]
    fn prop_failure_preserves_step_and_fields(prior in arb_fields(), step in "[a-z_]{3,12}") {
        prop_assume!(step != FlowStep::COMPLETE);
        let ctx = test_context();
        let mut state = ConversationState::initial(epoch());
        state.fields = prior;
        state.step = FlowStep::new(step);
        let busy = transition(
            &state,
            &ctx,
            Event::UserInput { text: "hi".to_string(), request_id: RequestId(1) },
            epoch(),
        ).unwrap().new_state;

        let after = transition(
            &busy,
            &ctx,
            Event::ProcessorFailed { request_id: RequestId(1), message: "boom".to_string() },
            epoch(),
        ).unwrap().new_state;

        prop_assert_eq!(&after.step, &busy.step);
        prop_assert_eq!(&after.fields, &busy.fields);
        prop_assert_eq!(after.transcript().len(), busy.transcript().len() + 1);
        prop_assert_eq!(after.transcript().last().unwrap().text.as_str(), APOLOGY_MESSAGE);
        prop_assert!(!after.is_busy());
    }

    // Any input at `complete` restarts from the exact initial state
    #[test]
    fn prop_input_at_complete_resets(text in arb_input_text()) {
        let mut sim = Simulation::new();
        for action in [
            Action::Input("1".to_string()),
            Action::Reply,
            Action::Input("Ada".to_string()),
            Action::Reply,
            Action::Confirm(true),
            Action::Reply,
        ] {
            sim.step(&action).unwrap();
        }
        prop_assert!(sim.state.step.is_complete());

        let result = sim.step(&Action::Input(text)).unwrap();
        prop_assert_eq!(result.new_state, ConversationState::initial(sim.clock));
        let called = result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CallProcessor { .. }));
        prop_assert!(!called);
        prop_assert!(sim.armed.is_empty());
    }

    // At most one armed timer, and it is always the one the state records
    #[test]
    fn prop_single_armed_timer(actions in proptest::collection::vec(arb_action(), 0..60)) {
        let mut sim = Simulation::new();
        for action in actions {
            let _ = sim.step(&action);
            prop_assert!(sim.armed.len() <= 1);
            let expected: HashSet<TimerId> = sim.state.pending_reset.into_iter().collect();
            prop_assert_eq!(&sim.armed, &expected);
        }
    }

    // Busy iff the runtime has an outstanding call for the same request
    #[test]
    fn prop_in_flight_tracks_outstanding_call(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut sim = Simulation::new();
        for action in actions {
            let _ = sim.step(&action);
            if let Some(id) = sim.state.in_flight {
                prop_assert_eq!(sim.outstanding.as_ref().map(|(o, _)| *o), Some(id));
            }
        }
    }

    // Reset then replay reproduces the same steps and fields
    #[test]
    fn prop_replay_after_reset_is_deterministic(inputs in proptest::collection::vec(arb_input_text(), 0..10)) {
        let mut sim = Simulation::new();
        let run = |sim: &mut Simulation| {
            let mut trace = Vec::new();
            for text in &inputs {
                if sim.step(&Action::Input(text.clone())).is_ok() {
                    let _ = sim.step(&Action::Reply);
                }
                trace.push((sim.state.step.clone(), sim.state.fields.clone()));
            }
            trace
        };

        let first = run(&mut sim);
        sim.step(&Action::Reset).unwrap();
        prop_assert!(is_initial(&sim.state));
        let second = run(&mut sim);
        prop_assert_eq!(first, second);
    }
}
