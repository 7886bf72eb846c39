//! `store` provides the document store abstraction shared by every component
//!
//! One backend owns all state. Entities implement [`types::Document`] and are accessed through
//! the typed [`Store`] facade, no cross collection transaction is assumed. The only conditional
//! write is the compare-and-swap behind [`Store::transition`]
pub mod memory;
pub mod store;
pub mod types;

pub use memory::MemoryStore;
pub use store::Store;
