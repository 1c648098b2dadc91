pub mod events;
pub mod types;

pub use events::{ChatEvent, PresenceEvent, SessionEvent};
pub use types::{
    ChatMessage, PeerAddress, SessionId, SessionInfo, TextStyle, TransferRequest, UserInfo,
};
