use serde::{Deserialize, Serialize};

use crate::didcomm::message::{AttachFormat, Attachment};

pub const PROPOSE_PRESENTATION: &str = "https://didcomm.org/present-proof/2.0/propose-presentation";
pub const REQUEST_PRESENTATION: &str = "https://didcomm.org/present-proof/2.0/request-presentation";
pub const PRESENTATION: &str = "https://didcomm.org/present-proof/2.0/presentation";
pub const ACK: &str = "https://didcomm.org/present-proof/2.0/ack";
pub const PROBLEM_REPORT: &str = "https://didcomm.org/present-proof/2.0/problem-report";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestPresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default)]
    pub will_confirm: bool,

    pub formats: Vec<AttachFormat>,

    #[serde(rename = "request_presentations~attach")]
    pub request_presentations_attach: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Presentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub formats: Vec<AttachFormat>,

    #[serde(rename = "presentations~attach")]
    pub presentations_attach: Vec<Attachment>,
}
