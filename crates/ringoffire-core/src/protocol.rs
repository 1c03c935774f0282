//! Bridge between local table edits and the relay server.
//!
//! Outbound, local changes become queued [`ClientMessage`]s, with cursor
//! and drag traffic throttled. Inbound, server messages are merged into the
//! [`TableState`]. Nothing is versioned: the last update to arrive wins.

use crate::card::{Card, CardId};
use crate::config::TableConfig;
use crate::sync::{ClientMessage, ProtocolError, ServerMessage};
use crate::table::TableState;
use crate::throttle::Throttle;
use kurbo::Point;
use std::time::Instant;

/// What an inbound message changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A participant's cursor was inserted or moved.
    CursorMoved { name: String },
    /// A participant left.
    CursorRemoved { name: String },
    /// A single card was merged. `found` is false when no card matched.
    CardUpdated { id: CardId, found: bool },
    /// The whole table was replaced.
    TableReplaced { card_count: usize },
    /// The server reported an error.
    Error { message: String },
}

/// Outbound queue plus inbound merge logic for one participant.
#[derive(Debug, Clone)]
pub struct SyncProtocol {
    throttle: Throttle,
    outgoing: Vec<ClientMessage>,
}

impl SyncProtocol {
    pub fn new(config: &TableConfig) -> Self {
        Self {
            throttle: Throttle::new(config.throttle_interval()),
            outgoing: Vec::new(),
        }
    }

    // --- Outbound ---

    /// Queue the registration sent right after connecting.
    ///
    /// It goes to the front so nothing reaches the relay under the
    /// connection's placeholder name. A cursor position queued while
    /// offline is stale by now and is dropped; card changes are kept.
    pub fn register(&mut self, query: &str) {
        self.outgoing.retain(|msg| {
            !matches!(
                msg,
                ClientMessage::Register { .. } | ClientMessage::CursorUpdate { .. }
            )
        });
        self.throttle.reset();
        self.outgoing.insert(
            0,
            ClientMessage::Register {
                query: query.to_string(),
            },
        );
    }

    /// Queue a cursor update, plus the held card if any, unless the last
    /// emission was less than one throttle interval ago.
    ///
    /// Returns true when something was queued.
    pub fn cursor_moved(
        &mut self,
        table: &TableState,
        cursor: Point,
        held: Option<CardId>,
        now: Instant,
    ) -> bool {
        if !self.throttle.try_fire(now) {
            return false;
        }
        self.outgoing
            .retain(|msg| !matches!(msg, ClientMessage::CursorUpdate { .. }));
        self.outgoing.push(ClientMessage::CursorUpdate {
            x: cursor.x,
            y: cursor.y,
        });
        if let Some(card) = held.and_then(|id| table.card(id)) {
            self.queue_card(*card);
        }
        true
    }

    /// Queue a single-card update right away, bypassing the throttle.
    pub fn send_card(&mut self, card: &Card) {
        self.queue_card(*card);
    }

    /// Queue a full snapshot of the table. Peers replace their cards with it.
    pub fn send_full_table(&mut self, table: &TableState) {
        // The snapshot supersedes every card change queued before it.
        self.outgoing.retain(|msg| {
            !matches!(
                msg,
                ClientMessage::CardUpdate(_) | ClientMessage::CardsUpdate { .. }
            )
        });
        self.outgoing.push(ClientMessage::CardsUpdate {
            cards: table.snapshot(),
        });
    }

    /// Unsent updates of the same card are replaced, so the queue stays
    /// bounded however long the socket is down.
    fn queue_card(&mut self, card: Card) {
        let id = card.id();
        self.outgoing
            .retain(|msg| !matches!(msg, ClientMessage::CardUpdate(queued) if queued.id() == id));
        self.outgoing.push(ClientMessage::CardUpdate(card));
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.outgoing.len()
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing messages.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // --- Inbound ---

    /// Parse a raw server message and merge it. Malformed messages are
    /// logged and dropped.
    pub fn handle_message(&mut self, table: &mut TableState, json: &str) -> Option<SyncEvent> {
        match ServerMessage::from_json(json) {
            Ok(msg) => Some(self.apply(table, msg)),
            Err(e) => {
                log::warn!("Dropping server message: {}", e);
                None
            }
        }
    }

    /// Merge an already-parsed server message.
    pub fn apply(&mut self, table: &mut TableState, msg: ServerMessage) -> SyncEvent {
        match msg {
            ServerMessage::Deregister { name } => {
                table.remove_cursor(&name);
                SyncEvent::CursorRemoved { name }
            }
            ServerMessage::CursorUpdate { name, x, y } => {
                table.upsert_cursor(&name, Point::new(x, y));
                SyncEvent::CursorMoved { name }
            }
            ServerMessage::CardUpdate(card) => {
                let found = table.apply_card_patch(card);
                SyncEvent::CardUpdated {
                    id: card.id(),
                    found,
                }
            }
            ServerMessage::CardsUpdate { cards } => {
                table.replace_all(cards);
                log::debug!("Table replaced with {} cards", table.card_count());
                SyncEvent::TableReplaced {
                    card_count: table.card_count(),
                }
            }
            ServerMessage::Error { message } => {
                log::warn!("Server error: {}", message);
                SyncEvent::Error { message }
            }
        }
    }

    /// Serialize every pending message, draining the queue.
    pub fn take_outgoing_json(&mut self) -> Result<Vec<String>, ProtocolError> {
        self.take_outgoing().iter().map(ClientMessage::to_json).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardState, Face, Suit};
    use kurbo::Vec2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn setup() -> (TableState, SyncProtocol) {
        let config = TableConfig::default();
        let mut table = TableState::new(config.clone());
        table.deal(&mut StdRng::seed_from_u64(11));
        (table, SyncProtocol::new(&config))
    }

    #[test]
    fn test_cursor_burst_is_throttled() {
        let (table, mut protocol) = setup();
        let start = Instant::now();
        let mut emitted = 0;
        for i in 0..10 {
            let now = start + Duration::from_millis(i);
            if protocol.cursor_moved(&table, Point::new(i as f64, 0.0), None, now) {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1);
        assert_eq!(protocol.take_outgoing().len(), 1);

        assert!(protocol.cursor_moved(&table, Point::ZERO, None, start + Duration::from_millis(60)));
        assert_eq!(protocol.take_outgoing().len(), 1);
    }

    #[test]
    fn test_held_card_rides_with_cursor() {
        let (table, mut protocol) = setup();
        let held = table.stack().top().unwrap();
        assert!(protocol.cursor_moved(&table, Point::new(5.0, 6.0), Some(held), Instant::now()));

        let out = protocol.take_outgoing();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], ClientMessage::CursorUpdate { x: 5.0, y: 6.0 });
        assert!(matches!(&out[1], ClientMessage::CardUpdate(card) if card.id() == held));
    }

    #[test]
    fn test_full_table_snapshot() {
        let (table, mut protocol) = setup();
        protocol.send_full_table(&table);
        match protocol.take_outgoing().pop() {
            Some(ClientMessage::CardsUpdate { cards }) => assert_eq!(cards.len(), 52),
            other => panic!("Wrong message: {:?}", other),
        }
        assert!(!protocol.has_outgoing());
    }

    #[test]
    fn test_inbound_cursor_and_deregister() {
        let (mut table, mut protocol) = setup();
        let event = protocol.handle_message(
            &mut table,
            r#"{"type":"server_cursor_update","name":"carol","x":3,"y":4}"#,
        );
        assert_eq!(event, Some(SyncEvent::CursorMoved { name: "carol".into() }));
        assert_eq!(table.cursor("carol").unwrap().position(), Point::new(3.0, 4.0));

        let event = protocol.handle_message(&mut table, r#"{"type":"deregister","name":"carol"}"#);
        assert_eq!(event, Some(SyncEvent::CursorRemoved { name: "carol".into() }));
        assert!(table.cursor("carol").is_none());

        // Removing again is harmless.
        protocol.handle_message(&mut table, r#"{"type":"deregister","name":"carol"}"#);
        assert_eq!(table.cursors().count(), 0);
    }

    #[test]
    fn test_inbound_flip_promotes() {
        let (mut table, mut protocol) = setup();
        let id = CardId::new(Suit::Hearts, Face::King);
        let mut patch = *table.card(id).unwrap();
        patch.state = CardState::FaceUp;
        let json = ServerMessage::CardUpdate(patch).to_json().unwrap();

        let event = protocol.handle_message(&mut table, &json);

        assert_eq!(event, Some(SyncEvent::CardUpdated { id, found: true }));
        assert_eq!(table.stack().top(), Some(id));
    }

    #[test]
    fn test_inbound_full_replace_compacts() {
        let (mut table, mut protocol) = setup();
        let ids: Vec<CardId> = table.cards().map(Card::id).collect();
        for id in ids.iter().take(5) {
            table.flip_face_up(*id);
        }
        assert_eq!(table.stack().empty_slots(), 5);

        let mut other = TableState::new(TableConfig::default());
        other.deal(&mut StdRng::seed_from_u64(12));
        other.move_card(ids[0], Vec2::new(1.0, 1.0));
        let json = ServerMessage::CardsUpdate { cards: other.snapshot() }.to_json().unwrap();

        let event = protocol.handle_message(&mut table, &json);

        assert_eq!(event, Some(SyncEvent::TableReplaced { card_count: 52 }));
        assert_eq!(table.stack().empty_slots(), 0);
        assert_eq!(table.snapshot(), other.snapshot());
    }

    #[test]
    fn test_malformed_is_dropped() {
        let (mut table, mut protocol) = setup();
        let before = table.snapshot();
        assert!(protocol.handle_message(&mut table, "{not json").is_none());
        assert!(protocol.handle_message(&mut table, r#"{"type":"server_card_update"}"#).is_none());
        assert_eq!(table.snapshot(), before);
    }

    #[test]
    fn test_unknown_card_patch_reports_not_found() {
        let mut table = TableState::new(TableConfig::default());
        let mut protocol = SyncProtocol::new(table.config());
        let card = Card::new(CardId::new(Suit::Clubs, Face::Three));
        let event = protocol.apply(&mut table, ServerMessage::CardUpdate(card));
        assert_eq!(event, SyncEvent::CardUpdated { id: card.id(), found: false });
    }

    #[test]
    fn test_offline_queue_stays_bounded() {
        let (mut table, mut protocol) = setup();
        let held = table.stack().top().unwrap();
        let start = Instant::now();
        for i in 0..200u64 {
            table.move_card(held, Vec2::new(1.0, 0.0));
            let now = start + Duration::from_millis(60 * i);
            assert!(protocol.cursor_moved(&table, Point::new(i as f64, 0.0), Some(held), now));
            assert!(protocol.pending() <= 2);
        }

        let out = protocol.take_outgoing();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], ClientMessage::CursorUpdate { x: 199.0, y: 0.0 });
        assert_eq!(out[1], ClientMessage::CardUpdate(*table.card(held).unwrap()));
    }

    #[test]
    fn test_register_goes_first_and_drops_stale_cursor() {
        let (table, mut protocol) = setup();
        let held = table.stack().top().unwrap();
        let start = Instant::now();
        for i in 0..200u64 {
            let now = start + Duration::from_millis(60 * i);
            protocol.cursor_moved(&table, Point::new(i as f64, 0.0), Some(held), now);
        }
        protocol.register("?name=erin");
        protocol.register("?name=erin");

        let out = protocol.take_outgoing();
        assert_eq!(
            out,
            vec![
                ClientMessage::Register { query: "?name=erin".into() },
                ClientMessage::CardUpdate(*table.card(held).unwrap()),
            ]
        );
    }

    #[test]
    fn test_snapshot_supersedes_queued_cards() {
        let (table, mut protocol) = setup();
        let top = *table.card(table.stack().top().unwrap()).unwrap();
        protocol.send_card(&top);
        protocol.send_full_table(&table);
        protocol.send_full_table(&table);

        let out = protocol.take_outgoing();
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], ClientMessage::CardsUpdate { cards } if cards.len() == 52));
    }

    #[test]
    fn test_take_outgoing_json() {
        let (_, mut protocol) = setup();
        protocol.register("?name=dave");
        let out = protocol.take_outgoing_json().unwrap();
        assert_eq!(out, vec![r#"{"type":"register","query":"?name=dave"}"#.to_string()]);
    }
}
