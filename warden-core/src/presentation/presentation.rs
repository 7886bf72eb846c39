use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::types::{composite_key, Document};

/// Presentation is a verified proof received for a [`super::PresentationRequest`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Presentation {
    pub id: String,
    pub piid: String,

    #[serde(rename = "theirDID")]
    pub their_did: String,

    #[serde(rename = "myDID")]
    pub my_did: String,

    pub format: String,

    #[serde(with = "crate::common::encoding::base64_bytes")]
    pub data: Vec<u8>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Presentation {
    /// new keys the presentation by thread and attachment so a replay overwrites itself
    pub fn new(
        piid: &str,
        attach_id: &str,
        their_did: &str,
        my_did: &str,
        format: &str,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id: composite_key(piid, attach_id),
            piid: piid.to_string(),
            their_did: their_did.to_string(),
            my_did: my_did.to_string(),
            format: format.to_string(),
            data,
            created_at: Utc::now(),
        }
    }
}

impl Document for Presentation {
    const COLLECTION: &'static str = "presentations";

    fn key(&self) -> String {
        self.id.clone()
    }
}
