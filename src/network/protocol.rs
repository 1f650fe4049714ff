//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON objects tagged by a `type` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::board::TileId;
use crate::game::cards::CardRequest;
use crate::game::events::GameEvent;
use crate::game::hero::CardKind;
use crate::game::intent::{ActionError, Intent};
use crate::game::snapshot::MatchSnapshot;
use crate::game::state::{Seat, UnitId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join (or create) a match room.
    JoinMatch(JoinRequest),

    RequestMove {
        unit_id: UnitId,
        to_tile: TileId,
    },

    UsePrimary {
        source_id: UnitId,
        #[serde(default)]
        target_id: Option<UnitId>,
    },

    UseSpecial {
        source_id: UnitId,
        #[serde(default)]
        target_id: Option<UnitId>,
        #[serde(default)]
        tile: Option<TileId>,
    },

    PlayCard(CardRequest),

    /// Show a card without playing it.
    RevealCard { card: CardKind },

    EndTurn,

    /// Keepalive.
    Ping {
        #[serde(default)]
        timestamp: Option<u64>,
    },
}

/// Join request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub match_id: String,
    /// Display name shown to the room
    #[serde(default)]
    pub name: Option<String>,
    /// Hero ids, one per role slot
    #[serde(default)]
    pub heroes: Option<Vec<String>>,
}

impl ClientMessage {
    /// The game intent this message carries, if any.
    pub fn into_intent(self) -> Option<Intent> {
        match self {
            ClientMessage::RequestMove { unit_id, to_tile } => {
                Some(Intent::Move { unit_id, to_tile })
            }
            ClientMessage::UsePrimary {
                source_id,
                target_id,
            } => Some(Intent::UsePrimary {
                source_id,
                target_id,
            }),
            ClientMessage::UseSpecial {
                source_id,
                target_id,
                tile,
            } => Some(Intent::UseSpecial {
                source_id,
                target_id,
                tile,
            }),
            ClientMessage::PlayCard(request) => Some(Intent::PlayCard(request)),
            ClientMessage::RevealCard { card } => Some(Intent::RevealCard { card }),
            ClientMessage::EndTurn => Some(Intent::EndTurn),
            ClientMessage::JoinMatch(_) | ClientMessage::Ping { .. } => None,
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full match state.
    Snapshot(MatchSnapshot),

    /// One game event, in the order it happened.
    Event { event: GameEvent },

    /// Seat of the receiving connection; `None` means spectator.
    RoleAssigned { seat: Option<Seat> },

    InsufficientEnergy {
        card: String,
        have: u32,
        required: u32,
    },

    InvalidMove { unit_id: UnitId, reason: String },

    /// The submitted team was not a legal pick.
    HeroSelectionInvalid { reason: String },

    Error(ServerError),

    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
        server_time: DateTime<Utc>,
    },

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

impl ServerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Reply for input that failed to parse.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new("invalid_input", message)
    }
}

impl ServerMessage {
    /// Reply owed to the acting client for a rejected intent.
    ///
    /// Structural rejections get no reply.
    pub fn rejection(err: &ActionError) -> Option<ServerMessage> {
        if err.is_structural() {
            return None;
        }
        Some(match err {
            ActionError::InsufficientEnergy {
                card,
                have,
                required,
            } => ServerMessage::InsufficientEnergy {
                card: card.clone(),
                have: *have,
                required: *required,
            },
            ActionError::InvalidMove { unit_id, reason } => ServerMessage::InvalidMove {
                unit_id: *unit_id,
                reason: reason.clone(),
            },
            other => ServerMessage::Error(ServerError::new(other.code(), other.to_string())),
        })
    }

    pub fn pong(timestamp: Option<u64>) -> Self {
        ServerMessage::Pong {
            timestamp,
            server_time: Utc::now(),
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
