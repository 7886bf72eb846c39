//! `did` holds DID records, the hub's signing keys and peer endpoint resolution
pub mod did;
pub mod doc;
pub mod endpoint;
pub mod keys;
pub mod types;

pub use did::{derive_did, did_from_verkey, expand_verkey, DID};
pub use doc::DidDoc;
pub use endpoint::StoreEndpointResolver;
pub use keys::{verify_signature, KeyManager, KeyPair};
pub use types::DIDError;
