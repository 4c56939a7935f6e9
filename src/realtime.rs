//! Supabase Realtime subscriber.
//!
//! Joins one private broadcast channel over the Phoenix websocket
//! protocol and relays every broadcast event into the orchestrator.
//! Messages are handled on spawned tasks so a slow notification never
//! blocks receipt of the next frame. Malformed frames are logged and
//! dropped; there is no retry and no reconnect.

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};

use crate::model::{NotificationEvent, NotificationKind};
use crate::relay::Relay;

/// Matches the topic used by `realtime.send()` on the database side.
pub const CHANNEL_NAME: &str = "cloudrun_notifications";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Subscribe to the broadcast channel and relay events until the stream
/// ends. Returns an error on connect/join failure; a server-side close
/// also ends the subscription (the HTTP ingress keeps serving).
pub async fn run(supabase_url: &str, service_role_key: &str, relay: Arc<Relay>) -> Result<()> {
    let url = websocket_url(supabase_url, service_role_key)?;
    info!(channel = CHANNEL_NAME, "subscribing to Supabase Realtime");

    let (ws, _) = connect_async(url.as_str())
        .await
        .context("failed to connect to Supabase Realtime")?;
    let (mut write, mut read) = ws.split();

    let mut next_ref: u64 = 1;
    write
        .send(Message::Text(
            join_message(service_role_key, next_ref).to_string(),
        ))
        .await
        .context("failed to join realtime channel")?;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                next_ref += 1;
                write
                    .send(Message::Text(heartbeat_message(next_ref).to_string()))
                    .await
                    .context("failed to send realtime heartbeat")?;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(&text, &relay),
                Some(Ok(Message::Close(close))) => {
                    error!(?close, channel = CHANNEL_NAME, "realtime channel closed by server");
                    return Ok(());
                }
                Some(Ok(_)) => {} // ping/pong/binary frames carry nothing for us
                Some(Err(err)) => {
                    return Err(err).context("realtime websocket error");
                }
                None => {
                    error!(channel = CHANNEL_NAME, "realtime stream ended");
                    return Ok(());
                }
            }
        }
    }
}

fn handle_frame(text: &str, relay: &Arc<Relay>) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            error!(?err, "received unparseable realtime frame");
            return;
        }
    };

    match frame.get("event").and_then(Value::as_str) {
        Some("broadcast") => match decode_broadcast(&frame) {
            Some(event) => {
                info!(
                    office_id = event.office_id,
                    kind = %event.kind,
                    "processing realtime notification"
                );
                let relay = Arc::clone(relay);
                tokio::spawn(async move {
                    match relay.process(&event).await {
                        Ok(outcome) => {
                            info!(?outcome, "realtime notification processed");
                        }
                        Err(err) => {
                            error!(?err, "realtime notification failed");
                        }
                    }
                });
            }
            None => {
                error!("received invalid or incomplete realtime message; dropping");
            }
        },
        Some("phx_reply") => {
            let status = frame
                .pointer("/payload/status")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            info!(status, channel = CHANNEL_NAME, "realtime subscription reply");
        }
        Some("phx_error") | Some("phx_close") => {
            error!(channel = CHANNEL_NAME, "realtime channel error frame: {text}");
        }
        Some("system") => {
            info!(channel = CHANNEL_NAME, "realtime system message: {text}");
        }
        _ => debug!("ignoring realtime frame: {text}"),
    }
}

/// Decode one broadcast frame into a notification event.
///
/// The broadcast wrapper's own event tag is authoritative for the kind;
/// a disagreeing `notification_type` inside the payload only produces a
/// warning. Frames missing the office id or notification type are
/// rejected with `None`.
fn decode_broadcast(frame: &Value) -> Option<NotificationEvent> {
    let broadcast = frame.get("payload")?;
    let event_tag = broadcast.get("event").and_then(Value::as_str)?;
    let payload = broadcast.get("payload")?;

    let office_id = payload.get("office_id").and_then(Value::as_i64)?;
    let embedded_type = payload.get("notification_type").and_then(Value::as_str)?;

    if event_tag != embedded_type {
        warn!(
            event = event_tag,
            notification_type = embedded_type,
            "event tag and payload notification_type disagree; using event tag"
        );
    }

    let data = payload.get("data").cloned().unwrap_or(Value::Null);
    Some(NotificationEvent::new(
        office_id,
        NotificationKind::parse(event_tag),
        data,
    ))
}

/// Websocket endpoint for the project's Realtime service.
fn websocket_url(supabase_url: &str, service_role_key: &str) -> Result<String> {
    let mut url = Url::parse(supabase_url).context("invalid Supabase URL")?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(anyhow!("unsupported Supabase URL scheme: {other}")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("failed to set websocket scheme"))?;
    url.set_path("/realtime/v1/websocket");
    url.set_query(Some(&format!("apikey={service_role_key}&vsn=1.0.0")));
    Ok(url.to_string())
}

/// Phoenix join frame for the private broadcast channel. The service
/// role key doubles as the channel access token so RLS-protected
/// channels accept the join.
fn join_message(access_token: &str, msg_ref: u64) -> Value {
    json!({
        "topic": format!("realtime:{CHANNEL_NAME}"),
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "private": true
            },
            "access_token": access_token
        },
        "ref": msg_ref.to_string()
    })
}

fn heartbeat_message(msg_ref: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string()
    })
}
