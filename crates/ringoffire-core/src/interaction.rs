//! Drag lifecycle for the local participant.
//!
//! Pointer input arrives here in table coordinates, already unscaled from
//! display pixels.

use crate::card::CardId;
use crate::protocol::SyncProtocol;
use crate::table::TableState;
use kurbo::{Point, Vec2};
use std::time::Instant;

/// State of the local pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    /// A card is being carried by the pointer.
    Dragging { card: CardId },
}

/// Turns pointer events into table edits and outbound updates.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    state: DragState,
    cursor: Point,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Card currently held, if any.
    pub fn held(&self) -> Option<CardId> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging { card } => Some(card),
        }
    }

    /// Local cursor position in table coordinates.
    pub fn cursor(&self) -> Point {
        self.cursor
    }

    /// Pick up the top-most card under `point`. Pressing on bare table
    /// stays idle.
    pub fn pointer_down(&mut self, table: &TableState, point: Point) {
        self.cursor = point;
        self.state = match table.top_card_at(point) {
            Some(card) => {
                log::debug!("Picked up {}", card);
                DragState::Dragging { card }
            }
            None => DragState::Idle,
        };
    }

    /// Move the cursor, carrying the held card with it, and emit a
    /// throttled cursor/card update.
    pub fn pointer_move(
        &mut self,
        table: &mut TableState,
        protocol: &mut SyncProtocol,
        delta: Vec2,
        now: Instant,
    ) {
        self.cursor += delta;
        if let Some(card) = self.held() {
            table.move_card(card, delta);
        }
        protocol.cursor_moved(table, self.cursor, self.held(), now);
    }

    /// Release. A card dropped outside the ring is turned face up and sent
    /// immediately so the flip cannot be lost to throttling.
    pub fn pointer_up(&mut self, table: &mut TableState, protocol: &mut SyncProtocol) {
        if let Some(id) = self.held() {
            if table.is_outside_ring(id) {
                if let Some(card) = table.flip_face_up(id) {
                    log::debug!("Turned {} face up", id);
                    protocol.send_card(card);
                }
            }
        }
        self.state = DragState::Idle;
    }

    /// Drop whatever is held where it is, without the ring check.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
