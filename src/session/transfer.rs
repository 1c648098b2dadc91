use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::common::types::{PeerAddress, SessionId, TransferRequest};
use crate::error::Result;
use crate::network::peer::PeerHandle;

/// Outbound file transfer towards the single remote peer of a pairwise
/// session. Only the invitation handshake lives here; moving the bytes is
/// the transport layer's job once the invite is accepted.
pub struct FileTransfer {
    request: TransferRequest,
    session: SessionId,
    local_user: PeerAddress,
    peer: Arc<dyn PeerHandle>,
    content: Vec<u8>,
}

impl FileTransfer {
    pub(crate) fn new(
        session: SessionId,
        peer: Arc<dyn PeerHandle>,
        local_user: PeerAddress,
        name: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        let request = TransferRequest {
            id: Uuid::new_v4(),
            name: name.into(),
            size: content.len() as u64,
        };
        Self {
            request,
            session,
            local_user,
            peer,
            content,
        }
    }

    /// Sends the transfer invite to the remote peer.
    pub(crate) async fn start(&self) -> Result<()> {
        self.peer
            .receive_transfer_invite(
                self.session,
                self.local_user.clone(),
                self.request.clone(),
            )
            .await
    }

    pub fn id(&self) -> Uuid {
        self.request.id
    }

    pub fn request(&self) -> &TransferRequest {
        &self.request
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Withdraws the offer.
    pub async fn cancel(&self) -> Result<()> {
        self.peer.cancel_transfer(self.request.id).await
    }
}

impl fmt::Debug for FileTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTransfer")
            .field("request", &self.request)
            .field("session", &self.session)
            .finish()
    }
}

/// An inbound transfer offer, already bound to the sender's [`PeerHandle`]
/// so accepting or declining needs no re-resolution.
pub struct TransferInvitation {
    request: TransferRequest,
    from: PeerAddress,
    peer: Arc<dyn PeerHandle>,
}

impl TransferInvitation {
    pub(crate) fn new(request: TransferRequest, from: PeerAddress, peer: Arc<dyn PeerHandle>) -> Self {
        Self {
            request,
            from,
            peer,
        }
    }

    pub fn request(&self) -> &TransferRequest {
        &self.request
    }

    pub fn from(&self) -> &PeerAddress {
        &self.from
    }

    pub async fn accept(&self) -> Result<()> {
        self.peer.accept_transfer(self.request.id).await
    }

    pub async fn decline(&self) -> Result<()> {
        self.peer.cancel_transfer(self.request.id).await
    }
}

impl fmt::Debug for TransferInvitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferInvitation")
            .field("request", &self.request)
            .field("from", &self.from)
            .finish()
    }
}
