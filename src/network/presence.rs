use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::types::{PeerAddress, UserInfo};
use crate::error::Result;

/// Typed messages on the presence rendezvous. The keep-alive service only
/// reacts to `KeepAlive` and `Logout`; anything else the transport may carry
/// is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PresenceMessage {
    KeepAlive(UserInfo),
    /// Graceful sign-off: stop tracking the peer without a loss event.
    Logout(PeerAddress),
}

/// Broadcast side of the presence rendezvous (UDP multicast or similar,
/// implemented outside this core). Inbound messages arrive on the mpsc
/// receiver handed to [`PresenceService::start`].
///
/// [`PresenceService::start`]: crate::presence::PresenceService::start
#[async_trait]
pub trait PresenceChannel: Send + Sync {
    async fn send_message(&self, message: PresenceMessage) -> Result<()>;
}
