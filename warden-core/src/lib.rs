//! `prople-warden-core` is the protocol orchestration layer of the warden credential hub
//!
//! It drives the connection bootstrap, credential issuance and proof presentation
//! conversations on behalf of many agents. Every collaborator that touches the outside world
//! (store backend, broker, envelope packer, transport, ledger, credential engines) is reached
//! through a trait so the runtime crates decide what is plugged in.
pub mod agent;
pub mod bridge;
pub mod broker;
pub mod common;
pub mod connection;
pub mod control;
pub mod did;
pub mod didcomm;
pub mod engine;
pub mod issuance;
pub mod ledger;
pub mod notifier;
pub mod presentation;
pub mod resolver;
pub mod router;
pub mod schema;
pub mod store;
pub mod worker;
