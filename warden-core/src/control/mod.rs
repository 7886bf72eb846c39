//! `control` is the operator facing surface of the hub
//!
//! [`usecase::ControlPlane`] implements [`types::AdminAPI`] over the store and the protocol
//! supervisors, agent lifecycle changes are fanned out through [`watcher::Watcher`]
pub mod types;
pub mod usecase;
pub mod watcher;

pub use types::AdminAPI;
pub use usecase::{ControlDeps, ControlPlane};
pub use watcher::{AgentWatch, Watcher};
