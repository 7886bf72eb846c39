mod packer;
pub use packer::PlaintextPacker;

mod transport;
pub use transport::{HttpTransport, WS_PING_INTERVAL};
