//! WebSocket endpoint of the real-time channel.
//!
//! Session protocol:
//! 1. subscribe to the hub (before reading the table, so nothing is missed)
//! 2. send `members_list`
//! 3. forward every hub event; on lag, send a fresh `members_list`
//!
//! Client frames are ignored except `Close`.

use super::AppState;
use crate::realtime::Event;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

type Sink = SplitSink<WebSocket, Message>;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| client_session(socket, state))
}

async fn client_session(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut events = state.hub.subscribe();
    info!(subscribers = state.hub.subscriber_count(), "client connected");

    if send_snapshot(&mut sink, &state).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "client lagged behind, resyncing");
                    if send_snapshot(&mut sink, &state).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("client disconnected");
}

async fn send_snapshot(sink: &mut Sink, state: &AppState) -> Result<(), axum::Error> {
    let event = match state.run(|roster| roster.list()).await {
        Ok(members) => {
            debug!(count = members.len(), "sending members list");
            Event::MembersList(members)
        }
        Err(err) => Event::Error {
            message: format!("Internal server error: {err}"),
        },
    };
    send_event(sink, &event).await
}

async fn send_event(sink: &mut Sink, event: &Event) -> Result<(), axum::Error> {
    match event.to_json() {
        Ok(text) => sink.send(Message::Text(text.into())).await,
        Err(err) => {
            warn!(event = event.name(), error = %err, "event encoding failed");
            Ok(())
        }
    }
}
