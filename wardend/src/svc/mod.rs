pub mod bridge;
pub mod hub;
pub mod logging;
pub mod resolver;
pub mod router;
pub mod rpc;
pub mod server;
pub mod worker;
