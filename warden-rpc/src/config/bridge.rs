use serde::Deserialize;

use crate::common::types::{CommonError, ToValidate};

#[derive(Deserialize, Debug, Clone)]
pub struct Bridge {
    pub(super) host: String,
    pub(super) port: String,

    /// secret is the registration token cloud agents present on `POST /cloudagents`
    pub(super) secret: String,
}

impl Bridge {
    pub fn get_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn get_secret(&self) -> String {
        self.secret.to_owned()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: "".to_string(),
            secret: "".to_string(),
        }
    }
}

impl ToValidate for Bridge {
    fn validate(&self) -> Result<(), CommonError> {
        if self.port.is_empty() {
            return Err(CommonError::ValidationError(
                "config: bridge:port is missing".to_string(),
            ));
        }

        if self.secret.is_empty() {
            return Err(CommonError::ValidationError(
                "config: bridge:secret is missing".to_string(),
            ));
        }

        Ok(())
    }
}
