use serde::{Deserialize, Serialize};

use crate::feed::Item;

/// A client-submitted intent to mutate the shared board.
///
/// One JSON object per WebSocket text frame, tagged by `type`. `DELETE` may
/// carry a `locator` hint so the hub can discard the backing upload; the hint
/// never reaches other clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ClientOp {
    Add {
        #[serde(flatten)]
        item: Item,
    },
    Delete {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        locator: Option<String>,
    },
    Reset,
}

/// A hub-emitted notification of a state change.
///
/// `Init` goes to exactly one connection right after its handshake; the rest
/// fan out to every connection, the originator included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ServerEvent {
    Init {
        items: Vec<Item>,
    },
    Add {
        #[serde(flatten)]
        item: Item,
    },
    Delete {
        id: String,
    },
    Reset,
}
