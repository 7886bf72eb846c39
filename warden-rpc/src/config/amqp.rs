use serde::Deserialize;

use crate::common::types::{CommonError, ToValidate};

/// AckMode selects when a consumed delivery is acknowledged
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// the worker acknowledges after handling, failures included
    #[default]
    Explicit,

    /// the broker considers a delivery acknowledged as soon as it is sent
    Auto,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Amqp {
    pub(super) address: String,

    #[serde(default)]
    pub(super) ack_mode: AckMode,

    #[serde(default = "default_prefetch")]
    pub(super) prefetch: u16,
}

fn default_prefetch() -> u16 {
    16
}

impl Amqp {
    pub fn get_address(&self) -> String {
        self.address.to_owned()
    }

    pub fn get_ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    pub fn get_prefetch(&self) -> u16 {
        self.prefetch
    }
}

impl Default for Amqp {
    fn default() -> Self {
        Self {
            address: "".to_string(),
            ack_mode: AckMode::default(),
            prefetch: default_prefetch(),
        }
    }
}

impl ToValidate for Amqp {
    fn validate(&self) -> Result<(), CommonError> {
        if self.address.is_empty() {
            return Err(CommonError::ValidationError(
                "config: amqp:address is missing".to_string(),
            ));
        }

        Ok(())
    }
}
