use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::didcomm::message::{AttachFormat, Attachment};

pub const PROPOSE_CREDENTIAL: &str = "https://didcomm.org/issue-credential/2.0/propose-credential";
pub const OFFER_CREDENTIAL: &str = "https://didcomm.org/issue-credential/2.0/offer-credential";
pub const REQUEST_CREDENTIAL: &str = "https://didcomm.org/issue-credential/2.0/request-credential";
pub const ISSUE_CREDENTIAL: &str = "https://didcomm.org/issue-credential/2.0/issue-credential";
pub const ACK: &str = "https://didcomm.org/issue-credential/2.0/ack";
pub const PROBLEM_REPORT: &str = "https://didcomm.org/issue-credential/2.0/problem-report";
pub const CREDENTIAL_PREVIEW: &str = "https://didcomm.org/issue-credential/2.0/credential-preview";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewAttribute {
    pub name: String,

    #[serde(rename = "mime-type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    pub value: String,
}

impl PreviewAttribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            mime_type: None,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialPreview {
    #[serde(rename = "@type")]
    pub preview_type: String,

    pub attributes: Vec<PreviewAttribute>,
}

impl CredentialPreview {
    pub fn new(attributes: Vec<PreviewAttribute>) -> Self {
        Self {
            preview_type: CREDENTIAL_PREVIEW.to_string(),
            attributes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProposeCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_preview: Option<CredentialPreview>,

    #[serde(default)]
    pub formats: Vec<AttachFormat>,

    #[serde(rename = "filters~attach", default)]
    pub filters_attach: Vec<Attachment>,
}

impl ProposeCredential {
    /// schema_id reads the `schema_id` out of the first JSON filter attachment
    pub fn schema_id(&self) -> Option<String> {
        self.filters_attach.iter().find_map(|attach| {
            let bytes = attach.fetch().ok()?;
            let value: Value = serde_json::from_slice(&bytes).ok()?;
            value
                .get("schema_id")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub credential_preview: CredentialPreview,

    pub formats: Vec<AttachFormat>,

    #[serde(rename = "offers~attach")]
    pub offers_attach: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default)]
    pub formats: Vec<AttachFormat>,

    #[serde(rename = "requests~attach")]
    pub requests_attach: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub formats: Vec<AttachFormat>,

    #[serde(rename = "credentials~attach")]
    pub credentials_attach: Vec<Attachment>,
}
