//! `broker` abstracts the AMQP work queues between the router and the protocol workers
pub mod memory;
pub mod types;

pub use memory::MemoryBroker;
