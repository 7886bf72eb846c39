//! `presentation` is the verifier side of the present-proof protocol
pub mod presentation;
pub mod request;
pub mod supervisor;
pub mod types;

pub use presentation::Presentation;
pub use request::PresentationRequest;
pub use supervisor::PresentationSupervisor;
pub use types::{PresentationEvent, PresentationState, ProofRequest};
