//! Runtime for executing kiosk conversations
//!
//! One [`ConversationRuntime`] task per session owns the state and executes
//! effects. Everything else talks to it through a [`SessionHandle`].

mod executor;


pub use executor::ConversationRuntime;

use crate::processor::MessageProcessor;
use crate::state_machine::{ConvContext, ConversationState, FlowStep, Turn, TransitionError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};

/// Events sent to stream subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Turn { turn: Turn },
    StateChange { state: ConversationState },
    Rejected { reason: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("'{0}' is not one of the offered options")]
    InvalidSelection(String),
    #[error("session {0} is no longer running")]
    Closed(String),
}

type Responder = oneshot::Sender<Result<(), SessionError>>;

/// Requests from handles to the runtime task
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Turn { text: String, respond: Responder },
    Confirm { accepted: bool, respond: Responder },
    Select { value: String, respond: Responder },
    Reset { respond: Responder },
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<ConversationState>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Free text, or the raw token of an option
    pub async fn submit_turn(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        self.request(|respond| SessionCommand::Turn { text, respond })
            .await
    }

    pub async fn submit_confirmation(&self, accepted: bool) -> Result<(), SessionError> {
        self.request(|respond| SessionCommand::Confirm { accepted, respond })
            .await
    }

    /// Pick one of the options offered by the latest bot prompt
    pub async fn select(&self, value: impl Into<String>) -> Result<(), SessionError> {
        let value = value.into();
        self.request(|respond| SessionCommand::Select { value, respond })
            .await
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        self.request(|respond| SessionCommand::Reset { respond })
            .await
    }

    pub fn snapshot(&self) -> ConversationState {
        self.snapshot_rx.borrow().clone()
    }

    #[cfg(test)]
    pub fn watch(&self) -> watch::Receiver<ConversationState> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    async fn request(
        &self,
        build: impl FnOnce(Responder) -> SessionCommand,
    ) -> Result<(), SessionError> {
        let (respond, outcome) = oneshot::channel();
        self.command_tx
            .send(build(respond))
            .await
            .map_err(|_| SessionError::Closed(self.session_id.clone()))?;
        outcome
            .await
            .map_err(|_| SessionError::Closed(self.session_id.clone()))?
    }
}

/// Start a runtime task for one session and return its handle
pub fn spawn_session<P>(context: ConvContext, processor: P) -> SessionHandle
where
    P: MessageProcessor + 'static,
{
    let session_id = context.session_id.clone();
    let (command_tx, command_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);

    let runtime = ConversationRuntime::new(context, processor, command_rx, broadcast_tx.clone());
    let snapshot_rx = runtime.watch();

    let conv_id = session_id.clone();
    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!(session_id = %conv_id, "Conversation runtime finished");
    });

    SessionHandle {
        session_id,
        command_tx,
        snapshot_rx,
        broadcast_tx,
    }
}

/// Session settings shared by every kiosk
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub reset_delay: Duration,
    pub confirmation_steps: Vec<FlowStep>,
}

/// Manager for all conversation runtimes, keyed by kiosk session id
pub struct SessionManager {
    processor: Arc<dyn MessageProcessor>,
    settings: SessionSettings,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(processor: Arc<dyn MessageProcessor>, settings: SessionSettings) -> Self {
        Self {
            processor,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a runtime under a fresh session id
    pub async fn create(&self) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().to_string();
        let context = ConvContext::new(&session_id)
            .with_reset_delay(self.settings.reset_delay)
            .with_confirmation_steps(self.settings.confirmation_steps.clone());
        let handle = spawn_session(context, Arc::clone(&self.processor));
        tracing::info!(session_id = %session_id, "Started conversation runtime");

        self.sessions
            .write()
            .await
            .insert(session_id, handle.clone());
        handle
    }

    /// Handle for a running session; unknown or closed ids are `None`
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop a session; its runtime stops and any pending reset is cancelled
    pub async fn close(&self, session_id: &str) -> bool {
        let closed = self.sessions.write().await.remove(session_id).is_some();
        if closed {
            tracing::info!(session_id = %session_id, "Closed conversation runtime");
        }
        closed
    }
}
