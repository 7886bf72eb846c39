pub mod types;

pub use types::{LedgerClient, LedgerError, Nym};
