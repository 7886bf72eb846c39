use serde::Deserialize;

use crate::common::types::{CommonError, ToValidate};

#[derive(Deserialize, Debug, Clone)]
pub struct App {
    pub(super) host: String,
    pub(super) port: String,

    #[serde(default = "default_timeout")]
    pub(super) timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl App {
    pub fn get_app_config(&self) -> (String, String) {
        (self.host.to_owned(), self.port.to_owned())
    }

    pub fn get_timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

impl Default for App {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: "".to_string(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ToValidate for App {
    fn validate(&self) -> Result<(), CommonError> {
        if self.host.is_empty() {
            return Err(CommonError::ValidationError(
                "config: app:host is missing".to_string(),
            ));
        }

        if self.port.is_empty() {
            return Err(CommonError::ValidationError(
                "config: app:port is missing".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::common::helpers::{self, testconfig};

    #[test]
    fn test_parse_app_config() {
        let content = std::fs::read_to_string(testconfig::fixture("config_app.toml")).unwrap();
        let config_app: App = toml::from_str(&content).unwrap();

        let (host, port) = config_app.get_app_config();
        assert_eq!(host, "localhost".to_string());
        assert_eq!(port, "8181".to_string());
        assert_eq!(config_app.get_timeout_secs(), 10);
    }

    #[test]
    fn test_app_validation_failed() {
        let validation = helpers::validate(App::default());
        assert!(validation.is_err());
        assert!(validation.unwrap_err().to_string().contains("app:port"));
    }
}
