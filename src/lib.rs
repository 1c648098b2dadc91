//! Session and presence core of a serverless peer-to-peer chat client.
//!
//! Every participant is simultaneously a client and a server: conversations
//! run over point-to-point RPC between peers, and reachability is established
//! by broadcast heartbeats instead of a central server. This crate owns the
//! two stateful protocols of such a client — [`ChatSession`] (one-to-one and
//! group conversations, invite/join/leave) and [`PresenceService`]
//! (heartbeats plus timeout-based loss detection) — behind transport traits
//! ([`PeerHandle`], [`PresenceChannel`]) implemented elsewhere.

pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod presence;
pub mod session;

pub use common::{
    ChatEvent, ChatMessage, PeerAddress, PresenceEvent, SessionEvent, SessionId, SessionInfo,
    TextStyle, TransferRequest, UserInfo,
};
pub use config::AppConfig;
pub use error::{ChatError, Result};
pub use network::{PeerFactory, PeerHandle, PresenceChannel, PresenceMessage};
pub use presence::PresenceService;
pub use session::{ChatSession, DeliveryReport, FileTransfer, SessionRegistry, TransferInvitation};
