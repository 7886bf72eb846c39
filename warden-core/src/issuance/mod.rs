//! `issuance` is the issuer side of the issue-credential protocol
//!
//! The ordered states live in [`types`], the persisted conversation in [`credential`] and the
//! protocol driver in [`supervisor`]
pub mod credential;
pub mod supervisor;
pub mod types;

pub use credential::IssuedCredential;
pub use supervisor::IssuanceSupervisor;
pub use types::{IssuanceEvent, IssuanceState};
