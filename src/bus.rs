//! Notification bus for change events.
//!
//! In-process, the bus is a `tokio::sync::broadcast` channel; publishing
//! is synchronous so non-async engine code can emit directly. Across
//! processes, a TCP relay forwards every event to each connection as a
//! JSON line, except back to the connection that originated it, and a
//! bridge client splices a remote relay into a local bus.
//!
//! Wire shape of one line: `{"kind":"created"|"updated"|"deleted","taskId":"..."}`.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::Result;

/// Origin tag for events published by the local engine.
pub const LOCAL_ORIGIN: u64 = 0;

/// Origin tag for events that arrived over a bridge from a remote relay.
pub const REMOTE_ORIGIN: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub task_id: String,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, task_id: impl Into<String>) -> Self {
        Self {
            kind,
            task_id: task_id.into(),
        }
    }
}

/// An event paired with the origin it entered this process through.
/// Origins let the relay skip echoing an event back to its source; local
/// consumers that don't care simply ignore the tag.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: u64,
    pub event: ChangeEvent,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Envelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event produced by this process.
    pub fn publish(&self, event: ChangeEvent) {
        self.publish_from(LOCAL_ORIGIN, event);
    }

    /// Publish with an explicit origin tag. A send error only means there
    /// are no subscribers right now, which is fine.
    pub fn publish_from(&self, origin: u64, event: ChangeEvent) {
        let _ = self.tx.send(Envelope { origin, event });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Accept relay connections forever, fanning bus events out to every
/// client and publishing client-submitted events to everyone else.
pub async fn run_relay(listener: TcpListener, bus: EventBus) -> Result<()> {
    let mut next_origin: u64 = 1;
    loop {
        let (stream, addr) = listener.accept().await?;
        let origin = next_origin;
        next_origin += 1;
        debug!(%addr, origin, "bus client connected");
        tokio::spawn(handle_client(stream, bus.clone(), origin));
    }
}

async fn handle_client(stream: TcpStream, bus: EventBus, origin: u64) {
    let (read_half, write_half) = stream.into_split();
    let rx = bus.subscribe();

    let writer = tokio::spawn(forward_events(rx, write_half, origin));

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ChangeEvent>(line) {
                    Ok(event) => bus.publish_from(origin, event),
                    Err(err) => warn!(origin, %err, "ignoring malformed bus line"),
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(origin, %err, "bus client read failed");
                break;
            }
        }
    }

    writer.abort();
    debug!(origin, "bus client disconnected");
}

/// Forward bus envelopes to one socket, skipping the socket's own events.
async fn forward_events(
    mut rx: broadcast::Receiver<Envelope>,
    mut writer: OwnedWriteHalf,
    skip_origin: u64,
) {
    loop {
        match rx.recv().await {
            Ok(envelope) => {
                if envelope.origin == skip_origin {
                    continue;
                }
                let mut line = match serde_json::to_string(&envelope.event) {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(%err, "failed to serialize bus event");
                        continue;
                    }
                };
                line.push('\n');
                if writer.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "bus subscriber lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Connect a local bus to a remote relay.
///
/// Locally published events go up the wire; lines from the wire are
/// published locally under [`REMOTE_ORIGIN`] so they are not sent back.
/// Returns when the connection closes.
pub async fn run_bridge(addr: &str, bus: EventBus) -> Result<()> {
    let stream = TcpStream::connect(addr).await?;
    debug!(%addr, "bridge connected");
    let (read_half, write_half) = stream.into_split();

    let rx = bus.subscribe();
    let uplink = tokio::spawn(forward_events(rx, write_half, REMOTE_ORIGIN));

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ChangeEvent>(line) {
                    Ok(event) => bus.publish_from(REMOTE_ORIGIN, event),
                    Err(err) => warn!(%err, "ignoring malformed bus line"),
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(%err, "bridge read failed");
                break;
            }
        }
    }

    uplink.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_shape_is_camel_case() {
        let event = ChangeEvent::new(ChangeKind::Created, "t1");
        let json = serde_json::to_string(&event).expect("json");
        assert_eq!(json, r#"{"kind":"created","taskId":"t1"}"#);

        let parsed: ChangeEvent = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, event);
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = EventBus::new(16);
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();

        bus.publish(ChangeEvent::new(ChangeKind::Updated, "t1"));

        let got_a = rx_a.recv().await.expect("recv");
        let got_b = rx_b.recv().await.expect("recv");
        assert_eq!(got_a.event.task_id, "t1");
        assert_eq!(got_b.event.task_id, "t1");
        assert_eq!(got_a.origin, LOCAL_ORIGIN);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        bus.publish(ChangeEvent::new(ChangeKind::Deleted, "t1"));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
