//! Hot reload events over server-sent events.
//!
//! Clients connect to [`HOT_PATH`] and receive one JSON object per event:
//!
//! ```text
//! data: {"action":"building"}
//! data: {"action":"built","hash":"…","errors":[],"warnings":[]}
//! data: {"action":"reload"}
//! ```
//!
//! plus a heartbeat every [`HEARTBEAT`].

use axum::response::sse::{Event, Sse};
use futures::stream::{self, Stream};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Path of the event stream.
pub const HOT_PATH: &str = "/__webpack_hmr";

pub const HEARTBEAT: Duration = Duration::from_secs(2);

/// Heartbeat payload (a heart emoji).
pub const HEARTBEAT_DATA: &str = "\u{1f493}";

/// Events published by the compile loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HotEvent {
    Building,
    Built {
        hash: String,
        errors: Vec<String>,
        warnings: Vec<String>,
    },
    /// The HTML document changed; reload the page.
    Reload,
}

impl HotEvent {
    #[must_use]
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(_) => r#"{"action":"reload"}"#.to_string(),
        }
    }
}

/// Fan-out of hot events to every connected client.
#[derive(Debug, Clone)]
pub struct HotHub {
    tx: broadcast::Sender<HotEvent>,
    shutdown: watch::Receiver<bool>,
}

impl HotHub {
    /// Streams end once `shutdown` turns `true`.
    #[must_use]
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx, shutdown }
    }

    pub fn publish(&self, event: HotEvent) {
        debug!(event = %event.to_json(), clients = self.tx.receiver_count(), "hot event");
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HotEvent> {
        self.tx.subscribe()
    }

    /// SSE payloads for one client: events and heartbeats until shutdown.
    pub fn stream(&self) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
        let state = StreamState {
            rx: self.tx.subscribe(),
            ticker: tokio::time::interval(HEARTBEAT),
            shutdown: self.shutdown.clone(),
        };

        stream::unfold(state, |mut s| async move {
            loop {
                if *s.shutdown.borrow() {
                    return None;
                }
                tokio::select! {
                    changed = s.shutdown.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                    _ = s.ticker.tick() => {
                        return Some((Ok(Event::default().data(HEARTBEAT_DATA)), s));
                    }
                    event = s.rx.recv() => match event {
                        Ok(event) => {
                            return Some((Ok(Event::default().data(event.to_json())), s));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "hot client lagging");
                        }
                        Err(RecvError::Closed) => return None,
                    },
                }
            }
        })
    }

    /// Response for a new client.
    pub fn sse(&self) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        Sse::new(self.stream())
    }
}

struct StreamState {
    rx: broadcast::Receiver<HotEvent>,
    ticker: tokio::time::Interval,
    shutdown: watch::Receiver<bool>,
}
