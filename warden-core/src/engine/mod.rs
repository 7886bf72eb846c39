//! Credential and presentation engines
//!
//! Engines are resolved by format through [`CredentialRegistry`] and [`PresentationRegistry`].
//! Only the `lds/ld-proof` engine is bundled, any other format must be provided by the caller
pub mod lds;
pub mod registry;
pub mod types;

pub use lds::LdProofEngine;
pub use registry::{CredentialRegistry, PresentationRegistry};
pub use types::{
    AttributeInfo, CredentialEngine, CredentialOffer, CredentialValues, EngineError, Format,
    PredicateInfo, PresentationEngine,
};
