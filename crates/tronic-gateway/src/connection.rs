use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tronic_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Seam between the socket loop and the message relay, so the gateway does
/// not depend on the API crate. Implementations swallow their own failures;
/// the socket loop never surfaces relay errors to the peer.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn relay(&self, user_id: Uuid, room_id: String, content: String);
}

/// Handle a single WebSocket connection until it closes, then clean up its
/// room memberships.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, sink: Arc<dyn MessageSink>) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut event_rx) = dispatcher.register().await;
    info!("Connection {} joined the gateway", conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward dispatcher events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_recv, conn_id, &sink, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "Connection {} bad command: {} -- raw: {}",
                            conn_id,
                            e,
                            log_preview(&text)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(conn_id).await;
    info!("Connection {} left the gateway", conn_id);
}

/// First 200 bytes of an unparseable frame, cut back to a char boundary so
/// multi-byte input can't panic the slice.
fn log_preview(text: &str) -> &str {
    if text.len() <= 200 {
        return text;
    }
    let mut end = 200;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

async fn handle_command(
    dispatcher: &Dispatcher,
    conn_id: Uuid,
    sink: &Arc<dyn MessageSink>,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::JoinRoom(room_id) => {
            debug!("Connection {} joining room {}", conn_id, room_id);
            dispatcher.join(conn_id, &room_id).await;
        }

        GatewayCommand::LeaveRoom(room_id) => {
            debug!("Connection {} leaving room {}", conn_id, room_id);
            dispatcher.leave(conn_id, &room_id).await;
        }

        GatewayCommand::SendMessage {
            content,
            room_id,
            user_id,
        } => {
            let room_id = room_id.unwrap_or_else(|| "general".to_string());
            sink.relay(user_id, room_id, content).await;
        }

        GatewayCommand::UserOnline(user_id) => {
            dispatcher
                .broadcast_except(
                    conn_id,
                    GatewayEvent::UserStatusChange {
                        user_id,
                        status: "online".to_string(),
                    },
                )
                .await;
        }

        GatewayCommand::UserOffline(user_id) => {
            dispatcher
                .broadcast_except(
                    conn_id,
                    GatewayEvent::UserStatusChange {
                        user_id,
                        status: "offline".to_string(),
                    },
                )
                .await;
        }
    }
}
