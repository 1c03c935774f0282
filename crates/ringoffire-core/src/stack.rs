//! Z-order of the cards on the table.
//!
//! Slots are stable: promoting a card to the top leaves an empty slot where
//! it was and appends a new slot at the end, so nothing else shifts. Empty
//! slots are never handed out; they go away on [`StackOrder::compact`] or a
//! wholesale [`StackOrder::replace_all`].

use crate::card::{Card, CardId};
use crate::geometry::point_in_rotated_rect;
use kurbo::{Point, Size};
use std::collections::HashMap;

/// Cards ordered back to front (last slot is drawn on top).
#[derive(Debug, Clone, Default)]
pub struct StackOrder {
    slots: Vec<Option<Card>>,
    /// Slot of every occupied card.
    index: HashMap<CardId, usize>,
}

impl StackOrder {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a compact stack from cards in back-to-front order.
    ///
    /// A repeated identity keeps only its last (top-most) occurrence.
    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut stack = Self::new();
        stack.replace_all(cards);
        stack
    }

    /// Number of cards (occupied slots).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of slots, occupied or empty.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of empty slots left behind by promotions.
    pub fn empty_slots(&self) -> usize {
        self.slots.len() - self.index.len()
    }

    pub fn contains(&self, id: CardId) -> bool {
        self.index.contains_key(&id)
    }

    /// Slot index of a card, if present.
    pub fn slot_of(&self, id: CardId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_ref()
    }

    pub fn get_mut(&mut self, id: CardId) -> Option<&mut Card> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_mut()
    }

    /// Cards back to front, skipping empty slots.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Card> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Card> {
        self.slots.iter_mut().flatten()
    }

    /// Id of the top-most card.
    pub fn top(&self) -> Option<CardId> {
        self.iter().next_back().map(Card::id)
    }

    /// Compact copy of the cards, back to front.
    pub fn snapshot(&self) -> Vec<Card> {
        self.iter().copied().collect()
    }

    /// Append a card on top. A card with the same identity is promoted and
    /// replaced instead, so identities stay unique.
    pub fn push(&mut self, card: Card) {
        let id = card.id();
        if self.index.contains_key(&id) {
            self.promote_to_top(id, Some(card));
            return;
        }
        self.index.insert(id, self.slots.len());
        self.slots.push(Some(card));
    }

    /// Move a card to the top, optionally swapping in `replacement`.
    ///
    /// The old slot becomes empty; other cards keep their slots. Returns
    /// false when the card is not on the stack.
    pub fn promote_to_top(&mut self, id: CardId, replacement: Option<Card>) -> bool {
        match self.index.get(&id) {
            Some(&slot) => self.promote_slot_to_top(slot, replacement),
            None => false,
        }
    }

    /// Slot-addressed form of [`Self::promote_to_top`], for callers that
    /// already hold the index. Returns false for an empty or missing slot.
    pub fn promote_slot_to_top(&mut self, slot: usize, replacement: Option<Card>) -> bool {
        let Some(current) = self.slots.get_mut(slot).and_then(Option::take) else {
            return false;
        };
        self.index.remove(&current.id());

        let card = replacement.unwrap_or(current);
        if let Some(stale) = self.index.insert(card.id(), self.slots.len()) {
            // Replacement carried another identity that was already placed.
            self.slots[stale] = None;
        }
        self.slots.push(Some(card));
        true
    }

    /// Top-most on-table card whose rotated bounds contain `point`.
    ///
    /// Scans every slot from the top down to and including the bottom one.
    pub fn find_top_at(&self, point: Point, size: Size) -> Option<&Card> {
        self.iter()
            .rev()
            .filter(|card| card.is_on_table())
            .find(|card| point_in_rotated_rect(card.origin(), size, card.rot, point))
    }

    /// Replace every card, dropping all empty slots.
    pub fn replace_all(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.slots.clear();
        self.index.clear();
        for card in cards {
            self.push(card);
        }
        self.compact();
    }

    /// Drop empty slots, keeping relative order.
    pub fn compact(&mut self) {
        if self.empty_slots() == 0 {
            return;
        }
        self.slots.retain(Option::is_some);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (slot, card) in self.slots.iter().enumerate() {
            if let Some(card) = card {
                self.index.insert(card.id(), slot);
            }
        }
    }
}
