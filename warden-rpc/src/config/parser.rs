use std::fs;

use crate::common::types::CommonError;

use super::Config;

pub struct Parser {
    conf_file: String,
}

impl Parser {
    pub fn new(conf_file: String) -> Self {
        Self { conf_file }
    }

    pub fn parse(&self) -> Result<Config, CommonError> {
        let content = fs::read_to_string(&self.conf_file).map_err(|err| {
            CommonError::ConfigError(format!("unable to read {}: {}", self.conf_file, err))
        })?;

        toml::from_str::<Config>(&content).map_err(|err| CommonError::ConfigError(err.to_string()))
    }
}
