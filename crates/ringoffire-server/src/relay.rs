//! Shared table state for the relay.
//!
//! The relay has no game logic. It names peers, fans messages out and
//! remembers the last full card snapshot so late joiners can catch up.

use dashmap::DashMap;
use ringoffire_core::{Card, ClientMessage, ServerMessage};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

const CHANNEL_CAPACITY: usize = 256;

/// Who a broadcast is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Everyone except the sender.
    Others,
    /// Everyone, sender included.
    Everyone,
}

/// A broadcast message tagged with its origin.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: String,
    pub audience: Audience,
    pub msg: ServerMessage,
}

impl Envelope {
    pub fn is_for(&self, peer_id: &str) -> bool {
        match self.audience {
            Audience::Everyone => true,
            Audience::Others => self.from != peer_id,
        }
    }
}

/// Pull the `name` parameter out of a page query string such as
/// `?name=alice&x=1`. A leading `?` is optional.
pub fn parse_name(query: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "name")
        .map(|(_, value)| value.into_owned())
        .filter(|name| !name.is_empty())
}

pub struct Relay {
    tx: broadcast::Sender<Envelope>,
    /// Display name per connection id.
    names: DashMap<String, String>,
    /// Last full snapshot, kept current with single-card updates.
    snapshot: RwLock<Option<Vec<Card>>>,
}

impl Relay {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            names: DashMap::new(),
            snapshot: RwLock::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Track a new connection. Its id doubles as its name until it
    /// registers.
    pub fn connect(&self, peer_id: &str) {
        self.names.insert(peer_id.to_string(), peer_id.to_string());
    }

    pub fn name_of(&self, peer_id: &str) -> String {
        self.names
            .get(peer_id)
            .map(|name| name.clone())
            .unwrap_or_else(|| peer_id.to_string())
    }

    pub fn peer_count(&self) -> usize {
        self.names.len()
    }

    /// Forget a connection and tell everyone to drop its cursor.
    pub fn disconnect(&self, peer_id: &str) {
        if let Some((_, name)) = self.names.remove(peer_id) {
            info!("Deregister {} ({})", name, peer_id);
            self.broadcast(peer_id, Audience::Others, ServerMessage::Deregister { name });
        }
    }

    pub async fn snapshot(&self) -> Option<Vec<Card>> {
        self.snapshot.read().await.clone()
    }

    /// Handle one client message. Returns a message for the sender alone,
    /// if any.
    pub async fn handle(&self, peer_id: &str, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Register { query } => {
                let name = parse_name(&query).unwrap_or_else(|| peer_id.to_string());
                info!("Register {} ({})", name, peer_id);
                // Peers may already hold a cursor under the old name.
                if let Some(old) = self.names.insert(peer_id.to_string(), name.clone()) {
                    if old != name {
                        self.broadcast(peer_id, Audience::Others, ServerMessage::Deregister { name: old });
                    }
                }
                self.snapshot
                    .read()
                    .await
                    .clone()
                    .map(|cards| ServerMessage::CardsUpdate { cards })
            }
            ClientMessage::CursorUpdate { x, y } => {
                let name = self.name_of(peer_id);
                self.broadcast(peer_id, Audience::Others, ServerMessage::CursorUpdate { name, x, y });
                None
            }
            ClientMessage::CardUpdate(card) => {
                if let Some(cards) = self.snapshot.write().await.as_mut() {
                    if let Some(stored) = cards.iter_mut().find(|c| c.id() == card.id()) {
                        *stored = card;
                    }
                }
                self.broadcast(peer_id, Audience::Others, ServerMessage::CardUpdate(card));
                None
            }
            ClientMessage::CardsUpdate { cards } => {
                debug!("Full table from {} ({} cards)", peer_id, cards.len());
                *self.snapshot.write().await = Some(cards.clone());
                // The sender resyncs too, compacting its own stack.
                self.broadcast(peer_id, Audience::Everyone, ServerMessage::CardsUpdate { cards });
                None
            }
        }
    }

    fn broadcast(&self, from: &str, audience: Audience, msg: ServerMessage) {
        // No subscribers is fine.
        let _ = self.tx.send(Envelope {
            from: from.to_string(),
            audience,
            msg,
        });
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
