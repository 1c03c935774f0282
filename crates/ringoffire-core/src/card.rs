//! Playing card identity and per-card table state.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card suit, written on the wire as a single letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "C")]
    Clubs,
    #[serde(rename = "D")]
    Diamonds,
    #[serde(rename = "H")]
    Hearts,
    #[serde(rename = "S")]
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    pub fn letter(self) -> char {
        match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
        }
    }
}

/// Card face value. Ten is written `T` on the wire; `10` is accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Face {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "T", alias = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
}

impl Face {
    pub const ALL: [Face; 13] = [
        Face::Ace,
        Face::Two,
        Face::Three,
        Face::Four,
        Face::Five,
        Face::Six,
        Face::Seven,
        Face::Eight,
        Face::Nine,
        Face::Ten,
        Face::Jack,
        Face::Queen,
        Face::King,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Face::Ace => "A",
            Face::Two => "2",
            Face::Three => "3",
            Face::Four => "4",
            Face::Five => "5",
            Face::Six => "6",
            Face::Seven => "7",
            Face::Eight => "8",
            Face::Nine => "9",
            Face::Ten => "T",
            Face::Jack => "J",
            Face::Queen => "Q",
            Face::King => "K",
        }
    }
}

/// Identity of a card. Unique across the table and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId {
    pub suit: Suit,
    pub face: Face,
}

impl CardId {
    pub const fn new(suit: Suit, face: Face) -> Self {
        Self { suit, face }
    }

    /// All 52 identities, suit-major.
    pub fn full_deck() -> impl Iterator<Item = CardId> {
        Suit::ALL
            .into_iter()
            .flat_map(|suit| Face::ALL.into_iter().map(move |face| CardId::new(suit, face)))
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.face.symbol(), self.suit.letter())
    }
}

/// Where a card currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardState {
    #[default]
    FaceDown,
    FaceUp,
    /// Collected; not drawn and not hit-testable.
    OffTable,
}

/// A card on the table.
///
/// `x`/`y` is the top-left corner before rotation, in canonical table
/// coordinates. `rot` is in degrees about that corner and is not normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub face: Face,
    pub x: f64,
    pub y: f64,
    pub rot: f64,
    pub state: CardState,
}

impl Card {
    /// A face-down card at the origin.
    pub fn new(id: CardId) -> Self {
        Self {
            suit: id.suit,
            face: id.face,
            x: 0.0,
            y: 0.0,
            rot: 0.0,
            state: CardState::FaceDown,
        }
    }

    pub fn id(&self) -> CardId {
        CardId::new(self.suit, self.face)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn set_origin(&mut self, origin: Point) {
        self.x = origin.x;
        self.y = origin.y;
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    pub fn is_on_table(&self) -> bool {
        self.state != CardState::OffTable
    }

    /// Whether every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.rot.is_finite()
    }
}
