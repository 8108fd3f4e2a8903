//! Server-Sent Events support

use super::types::{SessionView, TurnView};
use crate::runtime::SessionEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream, starting with an `init` snapshot
pub fn sse_stream(
    init: SessionView,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = init.session_id.clone();
    let init_event = Event::default()
        .event("init")
        .data(json!({ "type": "init", "session": init }).to_string());
    let init = futures::stream::once(async move { Ok(init_event) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(move |result| match result {
        Ok(event) => Some(Ok(session_event_to_axum(&session_id, event))),
        Err(_) => None, // Skip lagged messages
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn session_event_to_axum(session_id: &str, event: SessionEvent) -> Event {
    let (event_type, data) = match event {
        SessionEvent::Turn { turn } => (
            "turn",
            json!({
                "type": "turn",
                "turn": TurnView::from(&turn)
            }),
        ),
        SessionEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "session": SessionView::new(session_id, &state)
            }),
        ),
        SessionEvent::Rejected { reason } => (
            "rejected",
            json!({
                "type": "rejected",
                "reason": reason
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
