//! `didcomm` holds the wire model shared by the router and every protocol worker
//!
//! The envelope cryptography is not implemented here, it is reached through the [`types::Packer`]
//! trait. Outbound replies go through [`types::Outbound`], usually the [`Messenger`]
pub mod message;
pub mod messenger;
pub mod protocol;
pub mod types;

pub use message::{Attachment, AttachFormat, Message, MessageType, Thread};
pub use messenger::Messenger;
