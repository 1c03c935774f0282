//! Local mirror of every card and remote cursor on the table.

use crate::card::{Card, CardId, CardState};
use crate::config::TableConfig;
use crate::geometry::{origin_for_center, rect_center, rotate_around_center};
use crate::stack::StackOrder;
use kurbo::{Point, Size, Vec2};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::TAU;

/// A remote participant's pointer in table coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
}

impl Cursor {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A fresh deck of 52 face-down cards at the origin, shuffled.
pub fn init_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut cards: Vec<Card> = CardId::full_deck().map(Card::new).collect();
    cards.shuffle(rng);
    cards
}

/// Drop every card's center on a random point of the circle and give it a
/// random spin about that center.
pub fn scatter<'a, R: Rng + ?Sized>(
    cards: impl IntoIterator<Item = &'a mut Card>,
    center: Point,
    radius: f64,
    card_size: Size,
    rng: &mut R,
) {
    for card in cards {
        let theta = rng.gen_range(0.0..TAU);
        let on_circle = center + Vec2::from_angle(theta) * radius;
        card.set_origin(origin_for_center(on_circle, card_size));
        card.rot = 0.0;
        let spun = rotate_around_center(card.origin(), card_size, 0.0, rng.gen_range(0.0..360.0));
        card.set_origin(spun.origin);
        card.rot = spun.rot;
    }
}

/// Shift a card so its center lies within the table. Cards already inside
/// are untouched.
pub fn clamp_to_bounds(card: &mut Card, card_size: Size, table_size: Size) {
    let mid = rect_center(card.origin(), card_size, card.rot);
    if mid.x < 0.0 {
        card.x -= mid.x;
    } else if mid.x > table_size.width {
        card.x -= mid.x - table_size.width;
    }
    if mid.y < 0.0 {
        card.y -= mid.y;
    } else if mid.y > table_size.height {
        card.y -= mid.y - table_size.height;
    }
}

/// Whether the card's center is strictly farther than `outer_radius` plus
/// half a card width from `center`.
pub fn is_outside_ring(card: &Card, card_size: Size, center: Point, outer_radius: f64) -> bool {
    let mid = rect_center(card.origin(), card_size, card.rot);
    mid.distance(center) > outer_radius + card_size.width / 2.0
}

/// Cards and cursors for one table.
#[derive(Debug, Clone, Default)]
pub struct TableState {
    config: TableConfig,
    cards: StackOrder,
    cursors: HashMap<String, Cursor>,
}

impl TableState {
    /// An empty table; cards arrive from [`Self::deal`] or a full resync.
    pub fn new(config: TableConfig) -> Self {
        Self {
            config,
            cards: StackOrder::new(),
            cursors: HashMap::new(),
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn stack(&self) -> &StackOrder {
        &self.cards
    }

    /// Cards back to front.
    pub fn cards(&self) -> impl DoubleEndedIterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(id)
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    /// Compact copy of the cards for a full-table update.
    pub fn snapshot(&self) -> Vec<Card> {
        self.cards.snapshot()
    }

    pub fn card_center(&self, id: CardId) -> Option<Point> {
        self.card(id)
            .map(|card| rect_center(card.origin(), self.config.card_size(), card.rot))
    }

    /// Top-most on-table card under `point`.
    pub fn top_card_at(&self, point: Point) -> Option<CardId> {
        self.cards
            .find_top_at(point, self.config.card_size())
            .map(Card::id)
    }

    /// Shuffle a new deck and scatter it around the table center.
    pub fn deal<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut cards = init_deck(rng);
        scatter(
            cards.iter_mut(),
            self.config.table_center(),
            self.config.scatter_radius,
            self.config.card_size(),
            rng,
        );
        self.cards.replace_all(cards);
    }

    /// Scatter the current cards again without reshuffling.
    pub fn scatter<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let center = self.config.table_center();
        let (radius, size) = (self.config.scatter_radius, self.config.card_size());
        scatter(self.cards.iter_mut(), center, radius, size, rng);
    }

    /// Move a card by `delta`, then pull its center back onto the table.
    pub fn move_card(&mut self, id: CardId, delta: Vec2) -> Option<&Card> {
        let (card_size, table_size) = (self.config.card_size(), self.config.table_size());
        let card = self.cards.get_mut(id)?;
        card.translate(delta);
        clamp_to_bounds(card, card_size, table_size);
        Some(&*card)
    }

    pub fn is_outside_ring(&self, id: CardId) -> bool {
        self.card(id).is_some_and(|card| {
            is_outside_ring(
                card,
                self.config.card_size(),
                self.config.table_center(),
                self.config.outer_circle_radius,
            )
        })
    }

    /// Turn a card face up and bring it to the top.
    pub fn flip_face_up(&mut self, id: CardId) -> Option<&Card> {
        self.cards.get_mut(id)?.state = CardState::FaceUp;
        self.cards.promote_to_top(id, None);
        self.cards.get(id)
    }

    /// Take every face-up card off the table. Order is unchanged.
    pub fn clear_face_up(&mut self) -> usize {
        let mut cleared = 0;
        for card in self.cards.iter_mut() {
            if card.state == CardState::FaceUp {
                card.state = CardState::OffTable;
                cleared += 1;
            }
        }
        cleared
    }

    /// Merge a single-card update from a peer.
    ///
    /// A face-down card turning face up is promoted to the top so it shows
    /// above whatever covered it. Returns false if no card matches.
    pub fn apply_card_patch(&mut self, patch: Card) -> bool {
        let id = patch.id();
        let Some(card) = self.cards.get_mut(id) else {
            log::debug!("Ignoring patch for unknown card {}", id);
            return false;
        };
        if card.state == CardState::FaceDown && patch.state == CardState::FaceUp {
            self.cards.promote_to_top(id, Some(patch));
        } else {
            *card = patch;
        }
        true
    }

    /// Replace every card with a full snapshot, dropping empty slots.
    pub fn replace_all(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.cards.replace_all(cards);
    }

    // --- Cursors ---

    pub fn cursors(&self) -> impl Iterator<Item = (&str, &Cursor)> {
        self.cursors.iter().map(|(name, cursor)| (name.as_str(), cursor))
    }

    pub fn cursor(&self, name: &str) -> Option<&Cursor> {
        self.cursors.get(name)
    }

    /// Insert or overwrite a participant's cursor.
    pub fn upsert_cursor(&mut self, name: &str, position: Point) {
        let cursor = Cursor {
            x: position.x,
            y: position.y,
        };
        self.cursors.insert(name.to_string(), cursor);
    }

    /// Forget a participant's cursor. Absent names are fine.
    pub fn remove_cursor(&mut self, name: &str) -> bool {
        self.cursors.remove(name).is_some()
    }
}
