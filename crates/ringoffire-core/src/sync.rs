//! Wire messages exchanged with the relay server.
//!
//! Messages are JSON objects tagged by a `type` field. All coordinates are
//! canonical table units.

use crate::card::{Card, CardId};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors at the message boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Card {0} has a non-finite coordinate")]
    NonFiniteCard(CardId),
    #[error("Cursor has a non-finite coordinate")]
    NonFiniteCursor,
}

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the table. `query` is the page query string, e.g. `?name=alice`.
    Register { query: String },
    #[serde(rename = "client_cursor_update")]
    CursorUpdate { x: f64, y: f64 },
    /// One card changed.
    #[serde(rename = "client_card_update")]
    CardUpdate(Card),
    /// Authoritative snapshot of every card, back to front.
    #[serde(rename = "client_cards_update")]
    CardsUpdate {
        #[serde(deserialize_with = "skip_empty_slots")]
        cards: Vec<Card>,
    },
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A participant left; drop their cursor.
    Deregister { name: String },
    #[serde(rename = "server_cursor_update")]
    CursorUpdate { name: String, x: f64, y: f64 },
    #[serde(rename = "server_card_update")]
    CardUpdate(Card),
    /// Replace the whole table.
    #[serde(rename = "server_cards_update")]
    CardsUpdate {
        #[serde(deserialize_with = "skip_empty_slots")]
        cards: Vec<Card>,
    },
    /// The server rejected something we sent.
    Error { message: String },
}

/// Accept `null` entries in a card array and drop them.
fn skip_empty_slots<'de, D>(deserializer: D) -> Result<Vec<Card>, D::Error>
where
    D: Deserializer<'de>,
{
    let slots: Vec<Option<Card>> = Vec::deserialize(deserializer)?;
    Ok(slots.into_iter().flatten().collect())
}

fn check_card(card: &Card) -> Result<(), ProtocolError> {
    if card.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFiniteCard(card.id()))
    }
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a message from a client.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let msg: Self = serde_json::from_str(json)?;
        match &msg {
            ClientMessage::Register { .. } => {}
            ClientMessage::CursorUpdate { x, y } => {
                if !(x.is_finite() && y.is_finite()) {
                    return Err(ProtocolError::NonFiniteCursor);
                }
            }
            ClientMessage::CardUpdate(card) => check_card(card)?,
            ClientMessage::CardsUpdate { cards } => cards.iter().try_for_each(check_card)?,
        }
        Ok(msg)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a message from the server.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let msg: Self = serde_json::from_str(json)?;
        match &msg {
            ServerMessage::CursorUpdate { x, y, .. } => {
                if !(x.is_finite() && y.is_finite()) {
                    return Err(ProtocolError::NonFiniteCursor);
                }
            }
            ServerMessage::CardUpdate(card) => check_card(card)?,
            ServerMessage::CardsUpdate { cards } => cards.iter().try_for_each(check_card)?,
            ServerMessage::Deregister { .. } | ServerMessage::Error { .. } => {}
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardState, Face, Suit};

    #[test]
    fn test_register_serialize() {
        let msg = ClientMessage::Register { query: "?name=alice".to_string() };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"register""#));
        assert!(json.contains("?name=alice"));
    }

    #[test]
    fn test_card_update_is_flat() {
        let mut card = Card::new(CardId::new(Suit::Hearts, Face::King));
        card.state = CardState::FaceUp;
        let json = ClientMessage::CardUpdate(card).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "client_card_update");
        assert_eq!(value["suit"], "H");
        assert_eq!(value["face"], "K");
        assert_eq!(value["state"], "faceUp");
    }

    #[test]
    fn test_server_cursor_update_deserialize() {
        let json = r#"{"type":"server_cursor_update","name":"bob","x":10.5,"y":20}"#;
        match ServerMessage::from_json(json).unwrap() {
            ServerMessage::CursorUpdate { name, x, y } => {
                assert_eq!(name, "bob");
                assert!((x - 10.5).abs() < f64::EPSILON);
                assert!((y - 20.0).abs() < f64::EPSILON);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_cards_update_skips_nulls() {
        let json = r#"{"type":"server_cards_update","cards":[
            null,
            {"suit":"C","face":"10","x":1,"y":2,"rot":3,"state":"faceDown"},
            null,
            {"suit":"D","face":"A","x":4,"y":5,"rot":6,"state":"offTable"}
        ]}"#;
        match ServerMessage::from_json(json).unwrap() {
            ServerMessage::CardsUpdate { cards } => {
                assert_eq!(cards.len(), 2);
                assert_eq!(cards[0].id(), CardId::new(Suit::Clubs, Face::Ten));
                assert_eq!(cards[1].state, CardState::OffTable);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = ServerMessage::from_json(r#"{"type":"teleport","x":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_missing_field_rejected() {
        let json = r#"{"type":"server_card_update","suit":"H","face":"K","x":1,"y":2}"#;
        assert!(ServerMessage::from_json(json).is_err());
    }

    #[test]
    fn test_non_finite_card_rejected() {
        let mut card = Card::new(CardId::new(Suit::Spades, Face::Two));
        card.x = f64::NAN;
        // serde_json writes NaN as null, which fails to parse as f64.
        let json = ServerMessage::CardUpdate(card).to_json().unwrap();
        assert!(ServerMessage::from_json(&json).is_err());
        assert!(matches!(check_card(&card), Err(ProtocolError::NonFiniteCard(_))));
    }

    #[test]
    fn test_client_message_round_trip() {
        let msg = ClientMessage::CursorUpdate { x: 1.0, y: 2.0 };
        let json = msg.to_json().unwrap();
        assert_eq!(ClientMessage::from_json(&json).unwrap(), msg);
    }
}
