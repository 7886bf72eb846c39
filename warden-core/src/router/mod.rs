//! `router` is the protocol agnostic front door for inbound envelopes
pub mod router;
pub mod types;

pub use router::{validate_request, Router};
pub use types::{Routed, RouterError};
