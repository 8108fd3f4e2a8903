//! Effects produced by state transitions

use crate::processor::ProcessorRequest;
use crate::state_machine::state::{RequestId, TimerId, Turn};
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Hand the turn to the message processor (spawns as background task)
    CallProcessor {
        request_id: RequestId,
        request: ProcessorRequest,
    },

    /// Arm the one-shot auto-reset
    ScheduleReset { timer: TimerId, delay: Duration },

    /// Disarm a previously scheduled auto-reset
    CancelReset { timer: TimerId },

    /// Notify subscribers of a new transcript turn
    PublishTurn { turn: Turn },

    /// Publish the new state snapshot
    PublishState,
}

impl Effect {
    pub fn publish_turn(turn: &Turn) -> Self {
        Effect::PublishTurn { turn: turn.clone() }
    }
}
