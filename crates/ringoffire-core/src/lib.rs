//! Ring of Fire Core Library
//!
//! Shared card table state, geometry and the sync protocol for the
//! Ring of Fire multiplayer card table.

pub mod card;
pub mod config;
pub mod geometry;
pub mod interaction;
pub mod protocol;
pub mod scale;
pub mod session;
pub mod stack;
pub mod sync;
pub mod table;
pub mod throttle;
pub mod transport;

pub use card::{Card, CardId, CardState, Face, Suit};
pub use config::{ConfigError, TableConfig};
pub use geometry::{CARD_SIZE, Placement, RectPose, point_in_rotated_rect, rect_pose, rotate_around_center};
pub use interaction::{DragState, InteractionController};
pub use protocol::{SyncEvent, SyncProtocol};
pub use scale::DisplayScale;
pub use session::TableSession;
pub use stack::StackOrder;
pub use sync::{ClientMessage, ProtocolError, ServerMessage};
pub use table::{Cursor, TableState};
pub use throttle::Throttle;
pub use transport::{ConnectionState, TableSocket, TransportError, TransportEvent};
