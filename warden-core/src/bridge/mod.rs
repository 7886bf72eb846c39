//! `bridge` lets light edge wallets delegate their DIDComm traffic to the hub
//!
//! Wallets register with the operator secret and sign every later request with their ed25519
//! key. The hub keeps the wallet's connections, holds incoming offers and proof requests
//! until the wallet acts on them through [`BridgeAPI`]
pub mod auth;
pub mod holder;
pub mod types;
pub mod usecase;

pub use auth::{signed_payload, verify_request};
pub use holder::HolderHandler;
pub use types::{
    BridgeAPI, CloudAgent, CloudAgentConnection, CloudAgentCredential, CloudAgentProofRequest,
    HEADER_CLOUD_AGENT_ID, HEADER_CLOUD_AGENT_SIGNATURE,
};
pub use usecase::Bridge;
