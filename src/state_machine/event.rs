//! Events that can occur in a conversation

use crate::processor::ProcessorReply;
use crate::state_machine::state::{RequestId, TimerId};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Visitor events
    /// Free text or the token of a picked option
    UserInput {
        text: String,
        request_id: RequestId,
    },
    /// Confirm/edit decision on a summary
    Confirmation {
        accepted: bool,
        request_id: RequestId,
    },
    /// Explicit reset (staff action or teardown)
    Reset,

    // Processor events
    ProcessorReplied {
        request_id: RequestId,
        reply: ProcessorReply,
    },
    ProcessorFailed {
        request_id: RequestId,
        message: String,
    },

    // Timer events
    ResetTimerFired {
        timer: TimerId,
    },
}
