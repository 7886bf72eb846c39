use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::types::{DIDCommError, DIDCOMM_PREFIX};

/// MessageType is a parsed `@type` URI of the form `https://didcomm.org/<protocol>/<version>/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    pub protocol: String,
    pub version: String,
    pub name: String,
}

impl FromStr for MessageType {
    type Err = DIDCommError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let suffix = value
            .strip_prefix(DIDCOMM_PREFIX)
            .ok_or_else(|| DIDCommError::InvalidMessageType(value.to_string()))?;

        let parts: Vec<&str> = suffix.split('/').collect();
        match parts.as_slice() {
            [protocol, version, name]
                if !protocol.is_empty() && !version.is_empty() && !name.is_empty() =>
            {
                Ok(Self {
                    protocol: protocol.to_string(),
                    version: version.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(DIDCommError::InvalidMessageType(value.to_string())),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}/{}",
            DIDCOMM_PREFIX, self.protocol, self.version, self.name
        )
    }
}

/// Thread is the `~thread` decorator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Thread {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pthid: Option<String>,
}

/// Message is a plaintext DIDComm message
///
/// The protocol specific fields are kept in `body` so the same value can be decoded into any of
/// the typed protocol messages with [`Message::decode`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@type")]
    pub msg_type: String,

    #[serde(rename = "~thread", skip_serializing_if = "Option::is_none", default)]
    pub thread: Option<Thread>,

    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Message {
    pub fn new(msg_type: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            msg_type: msg_type.to_string(),
            thread: None,
            body: Map::new(),
        }
    }

    /// build creates a message of the given type with the fields of `body`
    pub fn build<T: Serialize>(msg_type: &str, body: &T) -> Result<Self, DIDCommError> {
        let value =
            serde_json::to_value(body).map_err(|err| DIDCommError::InvalidMessage(err.to_string()))?;

        let fields = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(DIDCommError::InvalidMessage(
                    "message body must be an object".to_string(),
                ))
            }
        };

        let mut message = Self::new(msg_type);
        message.body = fields;
        Ok(message)
    }

    pub fn with_thread(mut self, thid: &str) -> Self {
        let mut thread = self.thread.unwrap_or_default();
        thread.thid = Some(thid.to_string());
        self.thread = Some(thread);
        self
    }

    pub fn with_parent_thread(mut self, pthid: &str) -> Self {
        let mut thread = self.thread.unwrap_or_default();
        thread.pthid = Some(pthid.to_string());
        self.thread = Some(thread);
        self
    }

    /// thread_id returns the `~thread.thid`, a message without it starts its own thread
    pub fn thread_id(&self) -> String {
        self.thread
            .as_ref()
            .and_then(|thread| thread.thid.clone())
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn parent_thread_id(&self) -> Option<String> {
        self.thread.as_ref().and_then(|thread| thread.pthid.clone())
    }

    pub fn message_type(&self) -> Result<MessageType, DIDCommError> {
        MessageType::from_str(&self.msg_type)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DIDCommError> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|err| DIDCommError::InvalidMessage(err.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DIDCommError> {
        serde_json::from_slice(bytes).map_err(|err| DIDCommError::InvalidMessage(err.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DIDCommError> {
        serde_json::to_vec(self).map_err(|err| DIDCommError::InvalidMessage(err.to_string()))
    }
}

/// AttachmentData carries either base64 encoded bytes or an inline JSON value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AttachmentData {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base64: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub json: Option<Value>,
}

/// Attachment is the `~attach` decorator item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "mime-type", skip_serializing_if = "Option::is_none", default)]
    pub mime_type: Option<String>,

    pub data: AttachmentData,
}

impl Attachment {
    pub fn base64(id: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            id: id.to_string(),
            mime_type: Some(mime_type.to_string()),
            data: AttachmentData {
                base64: Some(STANDARD.encode(bytes)),
                json: None,
            },
        }
    }

    pub fn json(id: &str, value: Value) -> Self {
        Self {
            id: id.to_string(),
            mime_type: Some("application/json".to_string()),
            data: AttachmentData {
                base64: None,
                json: Some(value),
            },
        }
    }

    /// fetch returns the raw attachment bytes
    pub fn fetch(&self) -> Result<Vec<u8>, DIDCommError> {
        if let Some(encoded) = &self.data.base64 {
            return STANDARD
                .decode(encoded)
                .map_err(|err| DIDCommError::InvalidAttachment(err.to_string()));
        }

        if let Some(value) = &self.data.json {
            return serde_json::to_vec(value)
                .map_err(|err| DIDCommError::InvalidAttachment(err.to_string()));
        }

        Err(DIDCommError::InvalidAttachment(format!(
            "attachment {} has no data",
            self.id
        )))
    }
}

/// AttachFormat binds an attachment id to the engine format that produced it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachFormat {
    pub attach_id: String,
    pub format: String,
}

/// pair_formats joins each format entry with its attachment, unmatched entries are skipped
pub fn pair_formats<'a>(
    formats: &'a [AttachFormat],
    attachments: &'a [Attachment],
) -> Vec<(&'a AttachFormat, &'a Attachment)> {
    formats
        .iter()
        .filter_map(|format| {
            attachments
                .iter()
                .find(|attach| attach.id == format.attach_id)
                .map(|attach| (format, attach))
        })
        .collect()
}
