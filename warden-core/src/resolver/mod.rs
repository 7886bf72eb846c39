//! `resolver` serves DID resolution results backed by the ledger
pub mod resolver;

pub use resolver::{ResolutionResult, Resolver, ResolverMetadata};
