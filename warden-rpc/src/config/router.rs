use serde::Deserialize;

use crate::common::types::{CommonError, ToValidate};

/// Router holds the inbound listeners and the endpoint advertised to peers
#[derive(Deserialize, Debug, Clone)]
pub struct Router {
    pub(super) host: String,
    pub(super) http_port: String,

    #[serde(default)]
    pub(super) ws_port: String,

    pub(super) external: String,
}

impl Router {
    pub fn get_http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// get_ws_addr is `None` when no websocket listener is configured
    pub fn get_ws_addr(&self) -> Option<String> {
        if self.ws_port.is_empty() {
            return None;
        }

        Some(format!("{}:{}", self.host, self.ws_port))
    }

    pub fn get_external(&self) -> String {
        self.external.to_owned()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: "".to_string(),
            ws_port: "".to_string(),
            external: "".to_string(),
        }
    }
}

impl ToValidate for Router {
    fn validate(&self) -> Result<(), CommonError> {
        if self.http_port.is_empty() {
            return Err(CommonError::ValidationError(
                "config: router:http_port is missing".to_string(),
            ));
        }

        if self.external.is_empty() {
            return Err(CommonError::ValidationError(
                "config: router:external is missing".to_string(),
            ));
        }

        Ok(())
    }
}
