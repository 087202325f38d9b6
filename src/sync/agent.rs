use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::protocol::{ClientOp, ServerEvent};
use crate::feed::Item;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Events applied by an agent, buffered per observer.
const APPLIED_BUFFER: usize = 256;

/// Client-side view of the connection to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// A handshake attempt is in flight.
    Connecting,
    /// Events are flowing; operations can be submitted.
    Open,
    /// No transport; submissions are dropped until the next reconnect.
    Closed,
}

/// Configuration for a sync agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hub WebSocket URL, e.g. `ws://192.168.1.20:3210/ws`.
    pub url: String,
    /// Fixed pause between reconnect attempts. No backoff: LAN outages are
    /// assumed brief, and every reconnect resyncs in full anyway.
    pub reconnect_delay: Duration,
}

impl AgentConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

/// Mirrors the hub's board over a WebSocket and keeps it mirrored across
/// disconnects.
///
/// Submission is optimistic: the local copy changes immediately and the
/// operation goes out if the link is open, otherwise it is dropped with a
/// log line (no outbound queue; the user retries). The hub echoes every
/// accepted operation back, and `apply_event` reconciles the echo by id.
/// `run` drives the connect/apply/reconnect loop forever; recovery after any
/// disconnect is the next INIT, never a replay.
pub struct SyncAgent {
    config: AgentConfig,
    feed: Mutex<Vec<Item>>,
    state: Mutex<LinkState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientOp>>>,
    applied: broadcast::Sender<ServerEvent>,
}

impl SyncAgent {
    pub fn new(config: AgentConfig) -> Self {
        let (applied, _) = broadcast::channel(APPLIED_BUFFER);
        Self {
            config,
            feed: Mutex::new(Vec::new()),
            state: Mutex::new(LinkState::Closed),
            outbound: Mutex::new(None),
            applied,
        }
    }

    /// Current local copy of the board, newest-first.
    pub fn items(&self) -> Vec<Item> {
        self.feed.lock().clone()
    }

    pub fn link_state(&self) -> LinkState {
        *self.state.lock()
    }

    /// Observe every event as it is applied to the local copy.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.applied.subscribe()
    }

    /// Optimistically adds an item and submits it to the hub. Returns whether
    /// the operation was handed to an open link.
    pub fn submit(&self, item: Item) -> bool {
        {
            let mut feed = self.feed.lock();
            if !feed.iter().any(|existing| existing.id == item.id) {
                feed.insert(0, item.clone());
            }
        }
        self.send(ClientOp::Add { item })
    }

    pub fn submit_text(&self, text: impl Into<String>) -> (Item, bool) {
        let item = Item::text(text);
        let sent = self.submit(item.clone());
        (item, sent)
    }

    /// Optimistically removes an item and submits the deletion, hinting at
    /// the upload to discard when the removed copy carried a locator.
    pub fn delete(&self, id: &str) -> bool {
        let locator = {
            let mut feed = self.feed.lock();
            match feed.iter().position(|item| item.id == id) {
                Some(index) => feed.remove(index).locator,
                None => None,
            }
        };
        self.send(ClientOp::Delete {
            id: id.to_string(),
            locator,
        })
    }

    /// Optimistically clears the local copy and submits the reset.
    pub fn reset(&self) -> bool {
        self.feed.lock().clear();
        self.send(ClientOp::Reset)
    }

    /// Runs the connect/apply/reconnect loop forever.
    pub async fn run(&self) {
        loop {
            self.set_state(LinkState::Connecting);
            match self.connect_once().await {
                Ok(()) => tracing::info!(url = %self.config.url, "hub closed the link"),
                Err(err) => tracing::warn!(url = %self.config.url, %err, "link failed"),
            }
            self.set_state(LinkState::Closed);
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// One connection lifetime: handshake, then pump events in and
    /// operations out until the transport dies.
    async fn connect_once(&self) -> Result<()> {
        let url = Url::parse(&self.config.url).map_err(|e| anyhow!("invalid ws url: {e}"))?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<ClientOp>();
        *self.outbound.lock() = Some(tx);
        self.set_state(LinkState::Open);
        tracing::info!(url = %self.config.url, "link open");

        let result = loop {
            tokio::select! {
                outgoing = rx.recv() => {
                    // We hold a sender in `outbound` until teardown, so this
                    // channel cannot drain while the link is open.
                    let Some(op) = outgoing else { break Ok(()) };
                    if let Ok(text) = serde_json::to_string(&op) {
                        if let Err(err) = ws_tx.send(Message::Text(text.into())).await {
                            break Err(anyhow!(err));
                        }
                    }
                }
                incoming = ws_rx.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerEvent>(text.as_str()) {
                                Ok(event) => self.apply_event(event),
                                Err(err) => {
                                    tracing::warn!(%err, "dropping malformed event")
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(err)) => break Err(anyhow!(err)),
                    }
                }
            }
        };

        *self.outbound.lock() = None;
        result
    }

    /// Applies one hub event to the local copy.
    ///
    /// INIT replaces the local copy wholesale; it is the only way state is
    /// seeded, and applying it at any time (fresh connect or reconnect) is
    /// safe. ADD is reconciled by id against the optimistic copy; DELETE of
    /// something already gone and RESET of an empty board are fine.
    pub fn apply_event(&self, event: ServerEvent) {
        {
            let mut feed = self.feed.lock();
            match &event {
                ServerEvent::Init { items } => *feed = items.clone(),
                ServerEvent::Add { item } => {
                    if !feed.iter().any(|existing| existing.id == item.id) {
                        feed.insert(0, item.clone());
                    }
                }
                ServerEvent::Delete { id } => {
                    if let Some(index) = feed.iter().position(|item| &item.id == id) {
                        feed.remove(index);
                    }
                }
                ServerEvent::Reset => feed.clear(),
            }
        }
        let _ = self.applied.send(event);
    }

    fn send(&self, op: ClientOp) -> bool {
        let outbound = self.outbound.lock();
        match outbound.as_ref() {
            Some(tx) => tx.send(op).is_ok(),
            None => {
                tracing::warn!("link not open, dropping operation");
                false
            }
        }
    }

    fn set_state(&self, state: LinkState) {
        *self.state.lock() = state;
        tracing::debug!(?state, "link state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ItemKind;

    fn agent() -> SyncAgent {
        SyncAgent::new(AgentConfig::new("ws://127.0.0.1:1/ws"))
    }

    fn text(id: &str, content: &str) -> Item {
        Item {
            id: id.into(),
            kind: ItemKind::Text,
            content: content.into(),
            locator: None,
            media_type: None,
        }
    }

    #[test]
    fn init_replaces_local_state_wholesale() {
        let agent = agent();
        agent.apply_event(ServerEvent::Add {
            item: text("stale", "old"),
        });

        agent.apply_event(ServerEvent::Init {
            items: vec![text("b", "two"), text("a", "one")],
        });

        let ids: Vec<_> = agent.items().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn add_echo_reconciles_with_the_optimistic_copy() {
        let agent = agent();

        // Submitted while closed: dropped on the wire, applied locally.
        let sent = agent.submit(text("a", "hi"));
        assert!(!sent);
        assert_eq!(agent.items().len(), 1);

        // The echo (as it would arrive after a later resync) is absorbed.
        agent.apply_event(ServerEvent::Add {
            item: text("a", "hi"),
        });
        assert_eq!(agent.items().len(), 1);
    }

    #[test]
    fn applying_the_same_add_twice_equals_once() {
        let agent = agent();
        let event = ServerEvent::Add {
            item: text("a", "hi"),
        };
        agent.apply_event(event.clone());
        agent.apply_event(event);
        assert_eq!(agent.items().len(), 1);
    }

    #[test]
    fn delete_of_a_missing_item_is_not_an_error() {
        let agent = agent();
        agent.apply_event(ServerEvent::Delete { id: "ghost".into() });
        assert!(agent.items().is_empty());

        agent.apply_event(ServerEvent::Add {
            item: text("a", "hi"),
        });
        agent.apply_event(ServerEvent::Delete { id: "a".into() });
        assert!(agent.items().is_empty());
    }

    #[test]
    fn reset_clears_the_local_copy() {
        let agent = agent();
        agent.apply_event(ServerEvent::Add {
            item: text("a", "hi"),
        });
        agent.apply_event(ServerEvent::Reset);
        assert!(agent.items().is_empty());
    }

    #[test]
    fn delete_applies_locally_even_while_closed() {
        let agent = agent();
        agent.apply_event(ServerEvent::Add {
            item: Item {
                id: "a".into(),
                kind: ItemKind::Image,
                content: "cat.png".into(),
                locator: Some("/api/files/abc".into()),
                media_type: Some("image/png".into()),
            },
        });

        // Not open, so the op is dropped, but the local copy updates now.
        assert!(!agent.delete("a"));
        assert!(agent.items().is_empty());
    }

    #[test]
    fn observers_see_applied_events() {
        let agent = agent();
        let mut applied = agent.subscribe();

        agent.apply_event(ServerEvent::Add {
            item: text("a", "hi"),
        });

        assert!(matches!(
            applied.try_recv(),
            Ok(ServerEvent::Add { item }) if item.id == "a"
        ));
    }

    #[test]
    fn submissions_while_closed_are_dropped_not_queued() {
        let agent = agent();
        assert_eq!(agent.link_state(), LinkState::Closed);
        assert!(!agent.submit(text("a", "hi")));
        // The local effect landed even though the wire send did not.
        assert_eq!(agent.items().len(), 1);
        assert!(!agent.reset());
        assert!(agent.items().is_empty());
    }
}
