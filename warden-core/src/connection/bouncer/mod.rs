//! `bouncer` is the connection bootstrap subsystem
//!
//! [`machine::poll`] is the pure transition table, [`Bouncer`] persists the exchanges, talks to
//! the wire and resolves the completion waiters
pub mod bouncer;
pub mod machine;
pub mod types;

pub use bouncer::Bouncer;
pub use types::{BouncerError, Connection, ConnectionOutcome, Exchange, ExchangeState, Notify, Role};
