use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Network-reachable identity of a peer. Dùng chung cho chat lẫn presence:
/// one namespace, no separate user-id layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opaque conversation token. Sessions compare equal iff their ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A peer's identity plus its self-declared heartbeat interval.
///
/// Equality and hashing are by `id` only: two sightings of the same peer are
/// the same user even if the announced interval changed in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: PeerAddress,
    pub presence_endpoint: PeerAddress,
    pub keep_alive_interval: Duration,
}

impl PartialEq for UserInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UserInfo {}

impl Hash for UserInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Roster payload exchanged when a peer asks for the current participants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    pub participants: Vec<PeerAddress>,
}

/// Formatting attached to an outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font: String,
    pub size: u16,
    pub color: [u8; 3],
    pub bold: bool,
    pub italic: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: "Sans".to_string(),
            size: 12,
            color: [0, 0, 0],
            bold: false,
            italic: false,
        }
    }
}

/// Domain model đại diện một tin nhắn chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session: SessionId,
    pub sender: PeerAddress,
    pub style: TextStyle,
    pub text: String,
    pub timestamp: i64,
}

/// Metadata of an offered file transfer (invitation handshake only; the byte
/// stream itself moves outside this core).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
}
