//! One participant's view of the table.
//!
//! [`TableSession`] owns the table state, the sync protocol and the drag
//! controller, and is the only place they are wired together.

use crate::config::TableConfig;
use crate::interaction::InteractionController;
use crate::protocol::{SyncEvent, SyncProtocol};
use crate::sync::ClientMessage;
use crate::table::TableState;
use crate::transport::{TableSocket, TransportEvent};
use kurbo::{Point, Vec2};
use rand::Rng;
use std::time::Instant;

pub struct TableSession {
    table: TableState,
    protocol: SyncProtocol,
    controller: InteractionController,
    /// Query string sent with `register` each time the socket connects.
    query: String,
}

impl TableSession {
    pub fn new(config: TableConfig, query: impl Into<String>) -> Self {
        let protocol = SyncProtocol::new(&config);
        Self {
            table: TableState::new(config),
            protocol,
            controller: InteractionController::new(),
            query: query.into(),
        }
    }

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    // --- Table actions ---

    /// Shuffle, scatter and push the new layout to everyone.
    pub fn deal<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.controller.cancel();
        self.table.deal(rng);
        self.protocol.send_full_table(&self.table);
        log::info!("Dealt {} cards", self.table.card_count());
    }

    /// Take the face-up cards off the table and push the result.
    pub fn collect(&mut self) -> usize {
        let cleared = self.table.clear_face_up();
        self.protocol.send_full_table(&self.table);
        cleared
    }

    // --- Pointer input, in table coordinates ---

    pub fn pointer_down(&mut self, point: Point) {
        self.controller.pointer_down(&self.table, point);
    }

    pub fn pointer_move(&mut self, delta: Vec2, now: Instant) {
        self.controller
            .pointer_move(&mut self.table, &mut self.protocol, delta, now);
    }

    pub fn pointer_up(&mut self) {
        self.controller.pointer_up(&mut self.table, &mut self.protocol);
    }

    pub fn pointer_cancel(&mut self) {
        self.controller.cancel();
    }

    // --- Network ---

    /// Queue `register`; call whenever the transport (re)connects.
    pub fn on_connected(&mut self) {
        self.protocol.register(&self.query);
    }

    /// Merge one raw server message.
    pub fn handle_message(&mut self, json: &str) -> Option<SyncEvent> {
        self.protocol.handle_message(&mut self.table, json)
    }

    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        self.protocol.take_outgoing()
    }

    /// Feed transport events in and flush queued messages out. Returns what
    /// the inbound messages changed.
    pub fn pump(&mut self, socket: &mut TableSocket) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for event in socket.poll_events() {
            match event {
                TransportEvent::Connected => self.on_connected(),
                TransportEvent::Message(json) => events.extend(self.handle_message(&json)),
                TransportEvent::Disconnected => log::info!("Disconnected from table"),
                TransportEvent::Error { message } => log::warn!("Transport error: {}", message),
            }
        }

        if socket.is_connected() {
            for msg in self.protocol.take_outgoing() {
                match msg.to_json() {
                    Ok(json) => {
                        if let Err(e) = socket.send(&json) {
                            log::warn!("Failed to send message: {}", e);
                        }
                    }
                    Err(e) => log::warn!("Failed to encode message: {}", e),
                }
            }
        }
        events
    }
}
