pub mod peer;
pub mod presence;

pub use peer::{PeerFactory, PeerHandle};
pub use presence::{PresenceChannel, PresenceMessage};
