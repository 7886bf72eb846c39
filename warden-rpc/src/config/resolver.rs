use serde::Deserialize;

use crate::common::types::{CommonError, ToValidate};

#[derive(Deserialize, Debug, Clone)]
pub struct Resolver {
    pub(super) host: String,
    pub(super) port: String,

    #[serde(default = "default_method")]
    pub(super) method: String,
}

fn default_method() -> String {
    "sov".to_string()
}

impl Resolver {
    pub fn get_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn get_method(&self) -> String {
        self.method.to_owned()
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: "".to_string(),
            method: default_method(),
        }
    }
}

impl ToValidate for Resolver {
    fn validate(&self) -> Result<(), CommonError> {
        if self.port.is_empty() {
            return Err(CommonError::ValidationError(
                "config: resolver:port is missing".to_string(),
            ));
        }

        Ok(())
    }
}
