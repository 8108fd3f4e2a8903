//! Conversation runtime executor

use super::{SessionCommand, SessionError, SessionEvent};
use crate::extractor;
use crate::processor::MessageProcessor;
use crate::state_machine::{
    transition, ConvContext, ConversationState, Effect, Event, RequestId, TimerId,
    TransitionError,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Runtime for one kiosk session, generic over the message processor
pub struct ConversationRuntime<P>
where
    P: MessageProcessor + 'static,
{
    context: ConvContext,
    state: ConversationState,
    processor: Arc<P>,
    command_rx: mpsc::Receiver<SessionCommand>,
    /// Processor results and timer firings, fed back in by spawned tasks
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    snapshot_tx: watch::Sender<ConversationState>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    /// Last allocated request id; ids are never reused
    last_request_id: u64,
    /// The armed auto-reset, if any
    reset_timer: Option<(TimerId, CancellationToken)>,
}

impl<P> ConversationRuntime<P>
where
    P: MessageProcessor + 'static,
{
    pub fn new(
        context: ConvContext,
        processor: P,
        command_rx: mpsc::Receiver<SessionCommand>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let state = ConversationState::initial(Utc::now());
        let (event_tx, event_rx) = mpsc::channel(32);
        let (snapshot_tx, _) = watch::channel(state.clone());
        Self {
            context,
            state,
            processor: Arc::new(processor),
            command_rx,
            event_rx,
            event_tx,
            snapshot_tx,
            broadcast_tx,
            last_request_id: 0,
            reset_timer: None,
        }
    }

    pub fn watch(&self) -> watch::Receiver<ConversationState> {
        self.snapshot_tx.subscribe()
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting conversation runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // Every handle is gone
                    None => break,
                },
                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.apply(event) {
                        tracing::debug!(
                            session_id = %self.context.session_id,
                            error = %e,
                            "Ignoring event"
                        );
                    }
                }
            }
        }

        if let Some((timer, token)) = self.reset_timer.take() {
            tracing::debug!(timer = %timer, "Cancelling reset timer on teardown");
            token.cancel();
        }
        tracing::info!(session_id = %self.context.session_id, "Conversation runtime stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        let (outcome, respond) = match command {
            SessionCommand::Turn { text, respond } => {
                let request_id = self.next_request_id();
                (self.submit(Event::UserInput { text, request_id }), respond)
            }
            SessionCommand::Confirm { accepted, respond } => {
                let request_id = self.next_request_id();
                let event = Event::Confirmation {
                    accepted,
                    request_id,
                };
                (self.submit(event), respond)
            }
            SessionCommand::Select { value, respond } => (self.select(&value), respond),
            SessionCommand::Reset { respond } => (self.submit(Event::Reset), respond),
        };

        if let Err(e) = &outcome {
            tracing::info!(
                session_id = %self.context.session_id,
                busy = self.state.is_busy(),
                error = %e,
                "Submission rejected"
            );
            let _ = self.broadcast_tx.send(SessionEvent::Rejected {
                reason: e.to_string(),
            });
        }
        let _ = respond.send(outcome);
    }

    /// Resolve a picked option against the latest prompt and submit its token
    fn select(&mut self, value: &str) -> Result<(), SessionError> {
        let awaiting_confirmation = self.state.show_confirmation;
        let token = self
            .state
            .latest_prompt()
            .map(|turn| extractor::present(&turn.text, awaiting_confirmation))
            .and_then(|presentation| presentation.resolve_selection(value).map(str::to_string))
            .ok_or_else(|| SessionError::InvalidSelection(value.trim().to_string()))?;

        let request_id = self.next_request_id();
        self.submit(Event::UserInput {
            text: token,
            request_id,
        })
    }

    fn submit(&mut self, event: Event) -> Result<(), SessionError> {
        self.apply(event).map_err(SessionError::from)
    }

    fn next_request_id(&mut self) -> RequestId {
        self.last_request_id += 1;
        RequestId(self.last_request_id)
    }

    /// Pure transition, then effects
    fn apply(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, &self.context, event, Utc::now())?;
        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
        if self.state.pending_reset.is_none() {
            // Fired timers need no cancelling
            self.reset_timer = None;
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::CallProcessor {
                request_id,
                request,
            } => {
                // Spawn as background task; the result comes back as an event
                let processor = self.processor.clone();
                let event_tx = self.event_tx.clone();
                let session_id = self.context.session_id.clone();

                tokio::spawn(async move {
                    tracing::debug!(
                        session_id = %session_id,
                        request_id = %request_id,
                        current_step = %request.current_step,
                        "Calling message processor (background)"
                    );
                    let event = match processor.process(&request).await {
                        Ok(reply) => Event::ProcessorReplied { request_id, reply },
                        Err(e) => {
                            tracing::warn!(
                                session_id = %session_id,
                                request_id = %request_id,
                                error = %e,
                                "Message processor unavailable"
                            );
                            Event::ProcessorFailed {
                                request_id,
                                message: e.message,
                            }
                        }
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            Effect::ScheduleReset { timer, delay } => {
                let token = CancellationToken::new();
                if let Some((previous, old)) = self.reset_timer.replace((timer, token.clone())) {
                    tracing::debug!(timer = %previous, "Replacing reset timer");
                    old.cancel();
                }

                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;

                        () = token.cancelled() => {}

                        () = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(Event::ResetTimerFired { timer }).await;
                        }
                    }
                });
                tracing::info!(
                    session_id = %self.context.session_id,
                    timer = %timer,
                    delay_ms = %delay.as_millis(),
                    "Registration complete, reset scheduled"
                );
            }

            Effect::CancelReset { timer } => {
                if let Some((armed, token)) = self.reset_timer.take() {
                    if armed == timer {
                        token.cancel();
                    } else {
                        self.reset_timer = Some((armed, token));
                    }
                }
            }

            Effect::PublishTurn { turn } => {
                let _ = self.broadcast_tx.send(SessionEvent::Turn { turn });
            }

            Effect::PublishState => {
                self.snapshot_tx.send_replace(self.state.clone());
                let _ = self.broadcast_tx.send(SessionEvent::StateChange {
                    state: self.state.clone(),
                });
            }
        }
    }
}
