use thiserror::Error;

use crate::common::types::PeerAddress;

/// Error taxonomy of the session/presence core.
///
/// `Unreachable` is always scoped to a single peer: one failed delivery never
/// aborts a fan-out or another peer's processing.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: PeerAddress, reason: String },

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("peer {0} is not known here")]
    NotFound(PeerAddress),
}

impl ChatError {
    pub fn unreachable(peer: &PeerAddress, reason: impl Into<String>) -> Self {
        ChatError::Unreachable {
            peer: peer.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
