pub mod chat;
pub mod registry;
pub mod transfer;

pub use chat::{ChatSession, DeliveryReport};
pub use registry::SessionRegistry;
pub use transfer::{FileTransfer, TransferInvitation};
