//! Message types and bodies of the protocols the workers understand
//!
//! - `didexchange` connection bootstrap
//! - `issuecredential` issue-credential 2.0
//! - `presentproof` present-proof 2.0
use serde::{Deserialize, Serialize};

use super::message::Message;

pub mod didexchange;
pub mod issuecredential;
pub mod presentproof;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Description {
    pub code: String,

    #[serde(default)]
    pub en: String,
}

/// ProblemReport is shared by every protocol, only the `@type` differs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProblemReport {
    pub description: Description,
}

impl ProblemReport {
    pub fn new(code: &str, explain: &str) -> Self {
        Self {
            description: Description {
                code: code.to_string(),
                en: explain.to_string(),
            },
        }
    }

    /// into_message threads the report into an existing conversation
    pub fn into_message(self, msg_type: &str, thid: &str) -> Message {
        Message::build(msg_type, &self)
            .unwrap_or_else(|_| Message::new(msg_type))
            .with_thread(thid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }

    pub fn into_message(self, msg_type: &str, thid: &str) -> Message {
        Message::build(msg_type, &self)
            .unwrap_or_else(|_| Message::new(msg_type))
            .with_thread(thid)
    }
}
