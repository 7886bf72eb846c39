pub mod deadline;
pub mod encoding;
pub mod types;

pub use deadline::with_deadline;
pub use types::{ErrorCode, HubError, PaginationParams};
