use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use livepoll_db::Database;
use livepoll_types::events::PollFrame;

use crate::registry::SubscriptionRegistry;
use crate::snapshot::build_snapshot;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle one observer connection, scoped to a single poll for its whole
/// lifetime. The observer gets `initial_data` immediately, then a
/// `poll_update` for every vote on the poll until either side closes.
pub async fn handle_connection(
    socket: WebSocket,
    poll_id: Uuid,
    registry: SubscriptionRegistry,
    db: Arc<Database>,
) {
    // A subscription only forms for a poll that exists right now.
    let exists = {
        let db = db.clone();
        tokio::task::spawn_blocking(move || db.get_poll(&poll_id.to_string())).await
    };
    match exists {
        Ok(Ok(Some(_))) => {}
        Ok(Ok(None)) => {
            warn!("rejecting observer for unknown poll {}", poll_id);
            return;
        }
        Ok(Err(err)) => {
            warn!("poll lookup for {} failed: {}", poll_id, err);
            return;
        }
        Err(err) => {
            warn!("poll lookup task for {} failed: {}", poll_id, err);
            return;
        }
    }

    let (observer_id, mut frames) = registry.register().await;
    registry.subscribe(poll_id, observer_id).await;
    info!("observer {} connected to poll {}", observer_id, poll_id);

    // Built after the subscription forms: a vote landing in between is
    // either already in this snapshot or queued on the observer's channel.
    let initial = {
        let db = db.clone();
        tokio::task::spawn_blocking(move || build_snapshot(&db, poll_id)).await
    };
    let initial = match initial {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(err)) => {
            warn!("initial snapshot for poll {} failed: {}", poll_id, err);
            registry.unsubscribe_all(observer_id).await;
            return;
        }
        Err(err) => {
            warn!("snapshot task for poll {} failed: {}", poll_id, err);
            registry.unsubscribe_all(observer_id).await;
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    let hello = PollFrame::InitialData { poll: initial };
    if sender
        .send(Message::Text(serde_json::to_string(&hello).unwrap().into()))
        .await
        .is_err()
    {
        registry.unsubscribe_all(observer_id).await;
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward registry frames to the socket, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    let Some(frame) = frame else { break };
                    let text = serde_json::to_string(&frame).unwrap();
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
                            warn!(
                                "heartbeat timeout (missed {} pongs), dropping observer",
                                missed_heartbeats
                            );
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

    // Drain inbound frames. Anything the observer sends is treated as a
    // keep-alive and ignored; only Pong and Close matter.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
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

    registry.unsubscribe_all(observer_id).await;
    info!("observer {} disconnected from poll {}", observer_id, poll_id);
}
