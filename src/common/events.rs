use std::sync::Arc;

use tokio::sync::oneshot;

use crate::common::types::{
    ChatMessage, PeerAddress, SessionId, SessionInfo, TextStyle, TransferRequest, UserInfo,
};
use crate::session::{ChatSession, TransferInvitation};

/// Inbound remote calls, re-emitted as typed events by the transport dispatch
/// layer. Đây là mặt "LocalMessageBus" của core: the registry routes each
/// event to the owning session.
#[derive(Debug)]
pub enum ChatEvent {
    MessageReceived {
        session: SessionId,
        from: PeerAddress,
        style: TextStyle,
        text: String,
    },
    TypingReceived {
        session: SessionId,
        from: PeerAddress,
    },
    BuzzReceived {
        session: SessionId,
        from: PeerAddress,
    },
    UserJoined {
        session: SessionId,
        from: PeerAddress,
    },
    UserLeft {
        session: SessionId,
        from: PeerAddress,
    },
    InviteReceived {
        session: SessionId,
        from: PeerAddress,
        participants: Vec<PeerAddress>,
    },
    TransferInviteReceived {
        session: SessionId,
        from: PeerAddress,
        request: TransferRequest,
    },
    /// Remote peer asks for our view of the roster; the reply travels back
    /// over the oneshot so the transport layer can answer the RPC.
    SessionInfoRequested {
        session: SessionId,
        from: PeerAddress,
        reply: oneshot::Sender<SessionInfo>,
    },
}

impl ChatEvent {
    pub fn session(&self) -> SessionId {
        match self {
            ChatEvent::MessageReceived { session, .. }
            | ChatEvent::TypingReceived { session, .. }
            | ChatEvent::BuzzReceived { session, .. }
            | ChatEvent::UserJoined { session, .. }
            | ChatEvent::UserLeft { session, .. }
            | ChatEvent::InviteReceived { session, .. }
            | ChatEvent::TransferInviteReceived { session, .. }
            | ChatEvent::SessionInfoRequested { session, .. } => *session,
        }
    }

    pub fn sender(&self) -> &PeerAddress {
        match self {
            ChatEvent::MessageReceived { from, .. }
            | ChatEvent::TypingReceived { from, .. }
            | ChatEvent::BuzzReceived { from, .. }
            | ChatEvent::UserJoined { from, .. }
            | ChatEvent::UserLeft { from, .. }
            | ChatEvent::InviteReceived { from, .. }
            | ChatEvent::TransferInviteReceived { from, .. }
            | ChatEvent::SessionInfoRequested { from, .. } => from,
        }
    }
}

/// Sự kiện gửi lên tầng ứng dụng (UI).
#[derive(Debug)]
pub enum SessionEvent {
    /// A new session came into existence from inbound activity.
    ChatStarted {
        session: Arc<ChatSession>,
    },
    MessageReceived(ChatMessage),
    UserTyping {
        session: SessionId,
        user: PeerAddress,
    },
    BuzzReceived {
        session: SessionId,
        user: PeerAddress,
    },
    UserJoined {
        session: SessionId,
        user: PeerAddress,
    },
    UserLeft {
        session: SessionId,
        user: PeerAddress,
    },
    /// Fired exactly once, on the pairwise → group transition.
    GroupStarted {
        session: SessionId,
    },
    SessionEnded {
        session: SessionId,
    },
    TransferInviteReceived {
        session: SessionId,
        user: PeerAddress,
        invitation: TransferInvitation,
    },
}

/// Liveness notifications from the presence service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    UserDiscovered(UserInfo),
    UserLost(UserInfo),
}
