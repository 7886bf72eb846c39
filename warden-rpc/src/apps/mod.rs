pub mod broker;
pub mod db;
pub mod didcomm;
pub mod ledger;
pub mod provider;
pub mod webhook;

pub use db::Builder as DbBuilder;
pub use provider::Provider;
