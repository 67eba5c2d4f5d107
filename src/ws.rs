use axum::{
    debug_handler,
    extract::{
        Query, State, WebSocketUpgrade,
        rejection::QueryRejection,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    RelayError,
    relay::{Connected, RelayHandle, protocol::{ClientEvent, ServerEvent}},
};

#[derive(Deserialize)]
pub struct Handshake {
    username: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub async fn relay_ws(
    handshake: Result<Query<Handshake>, QueryRejection>,
    State(relay): State<RelayHandle>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // an unreadable query is treated as no username, so the client still
    // gets an error frame rather than a bare HTTP failure
    let username = handshake.ok().and_then(|Query(Handshake { username })| username);
    ws.on_upgrade(move |stream| serve_session(stream, relay, username))
}

async fn serve_session(stream: WebSocket, relay: RelayHandle, username: Option<String>) {
    let (mut sender, mut receiver) = stream.split();

    let Connected {
        session_id,
        mut events,
    } = match relay.connect(username).await {
        Ok(connected) => connected,
        Err(err) => {
            warn!(code = err.code(), "rejected handshake");
            if let Some(frame) = encode(&ServerEvent::error(&err)) {
                let _ = sender.send(frame).await;
            }
            let code = if err.is_fatal() {
                close_code::POLICY
            } else {
                close_code::ERROR
            };
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code,
                    reason: err.to_string().into(),
                })))
                .await;
            return;
        }
    };

    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(frame) = encode(&event) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                return;
            }
        }

        // the relay dropped this session, usually for falling behind
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: close_code::AGAIN,
                reason: "session dropped".into(),
            })))
            .await;
    });

    let mut receive_task = tokio::spawn({
        let relay = relay.clone();
        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };

                let delivered = match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => relay.dispatch(session_id, event).await,
                    Err(err) => {
                        relay
                            .reject(session_id, RelayError::MalformedEvent(err.to_string()))
                            .await
                    }
                };
                if delivered.is_err() {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    };

    debug!(session = %session_id, "connection closed");
    let _ = relay.disconnect(session_id).await;
}

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(err) => {
            warn!("failed to encode outbound event: {err}");
            None
        }
    }
}
