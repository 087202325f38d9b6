use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::protocol::{ClientOp, ServerEvent};
use crate::feed::{Item, ItemStore};

/// Buffered events per connection. A reader that falls this far behind on a
/// LAN is broken; the server closes it and lets the client resync via INIT.
const EVENT_BUFFER: usize = 256;

/// The single authority over the shared board.
///
/// Each operation mutates the store and publishes its event as one unit
/// under the store lock, so operations apply in a total order and the event
/// for operation *n* is queued to every connection before *n+1* touches the
/// store. Connections are broadcast subscribers: registering one means
/// subscribing, and dropping the receiver deregisters it.
pub struct Hub {
    store: Mutex<ItemStore>,
    events: broadcast::Sender<ServerEvent>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store: Mutex::new(ItemStore::new()),
            events,
        }
    }

    /// Registers a new connection: the returned snapshot is its INIT payload
    /// and the receiver yields every event published after that snapshot.
    ///
    /// Subscribing and snapshotting happen under the store lock, so the cut
    /// is exact: no event is ever missing from both, or present in both.
    pub fn join(&self) -> (Vec<Item>, broadcast::Receiver<ServerEvent>) {
        let store = self.store.lock();
        let receiver = self.events.subscribe();
        (store.snapshot(), receiver)
    }

    /// Applies one client operation and broadcasts the resulting event.
    ///
    /// Returns the locators of uploads that no longer back any item so the
    /// caller can discard them, best-effort. Policy per operation:
    /// - `ADD` with an empty id is dropped. A duplicate id leaves the store
    ///   untouched but the event still fans out; clients apply idempotently.
    /// - `DELETE` broadcasts only when something was actually removed:
    ///   first delete wins, the racing duplicate is silently absorbed.
    /// - `RESET` always clears and always broadcasts.
    pub fn apply(&self, op: ClientOp) -> Vec<String> {
        let mut store = self.store.lock();

        match op {
            ClientOp::Add { item } => {
                if item.id.is_empty() {
                    tracing::warn!("dropping ADD with empty id");
                    return Vec::new();
                }
                if !store.insert(item.clone()) {
                    tracing::debug!(id = %item.id, "duplicate ADD left store untouched");
                }
                let _ = self.events.send(ServerEvent::Add { item });
                Vec::new()
            }
            ClientOp::Delete { id, locator } => match store.remove(&id) {
                Some(removed) => {
                    let _ = self.events.send(ServerEvent::Delete { id });
                    locator.or(removed.locator).into_iter().collect()
                }
                None => {
                    tracing::debug!(%id, "DELETE for missing id absorbed");
                    Vec::new()
                }
            },
            ClientOp::Reset => {
                let drained = store.clear();
                let _ = self.events.send(ServerEvent::Reset);
                drained.into_iter().filter_map(|item| item.locator).collect()
            }
        }
    }

    /// Full ordered copy of the current board.
    pub fn snapshot(&self) -> Vec<Item> {
        self.store.lock().snapshot()
    }

    /// Number of live connections subscribed to the fan-out.
    pub fn client_count(&self) -> usize {
        self.events.receiver_count()
    }
}
