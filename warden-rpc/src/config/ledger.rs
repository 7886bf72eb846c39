use serde::Deserialize;

use crate::common::types::{CommonError, ToValidate};

#[derive(Deserialize, Debug, Clone)]
pub struct Ledger {
    pub(super) url: String,

    #[serde(default = "default_timeout")]
    pub(super) timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl Ledger {
    pub fn get_url(&self) -> String {
        self.url.to_owned()
    }

    pub fn get_timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            url: "".to_string(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ToValidate for Ledger {
    fn validate(&self) -> Result<(), CommonError> {
        if self.url.is_empty() {
            return Err(CommonError::ValidationError(
                "config: ledger:url is missing".to_string(),
            ));
        }

        Ok(())
    }
}
