use std::sync::Arc;

use async_trait::async_trait;

use crate::common::types::{PeerAddress, SessionId, SessionInfo, TextStyle, TransferRequest};
use crate::error::Result;
use uuid::Uuid;

/// Remote-callable surface of one peer, one method per point-to-point RPC.
///
/// Implemented outside this core by the transport layer. Any error means
/// "this peer is currently unreachable for this call"; the core never retries
/// a failed call itself.
#[async_trait]
pub trait PeerHandle: Send + Sync {
    async fn receive_message(
        &self,
        session: SessionId,
        sender: PeerAddress,
        style: TextStyle,
        text: String,
    ) -> Result<()>;

    async fn buzz(&self, session: SessionId, sender: PeerAddress) -> Result<()>;

    async fn user_is_typing(&self, session: SessionId, sender: PeerAddress) -> Result<()>;

    /// Carries the inviter's current participant list so the invitee can
    /// resolve everyone in the group.
    async fn receive_chat_invite(
        &self,
        session: SessionId,
        sender: PeerAddress,
        participants: Vec<PeerAddress>,
    ) -> Result<()>;

    async fn join_chat(&self, session: SessionId, sender: PeerAddress) -> Result<()>;

    async fn leave_chat(&self, session: SessionId, sender: PeerAddress) -> Result<()>;

    async fn get_session_info(
        &self,
        session: SessionId,
        requester: PeerAddress,
    ) -> Result<SessionInfo>;

    async fn receive_transfer_invite(
        &self,
        session: SessionId,
        sender: PeerAddress,
        request: TransferRequest,
    ) -> Result<()>;

    async fn accept_transfer(&self, transfer: Uuid) -> Result<()>;

    async fn cancel_transfer(&self, transfer: Uuid) -> Result<()>;
}

/// Resolves a [`PeerHandle`] for an address.
///
/// Injected into sessions and the registry so handle resolution stays lazy
/// and mockable; implementations typically cache per address.
pub trait PeerFactory: Send + Sync {
    fn connect(&self, address: &PeerAddress) -> Arc<dyn PeerHandle>;
}
