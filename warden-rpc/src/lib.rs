//! `prople-warden-rpc` is the runtime side of the warden credential hub
//!
//! It parses the daemon configuration, exposes the admin JSON-RPC processor and provides the
//! concrete backends the core crate is written against: the document store, the AMQP broker,
//! the envelope packer, the outbound transport, the ledger and webhook clients
use std::time::Duration;

pub mod apps;
pub mod common;
pub mod config;
pub mod rpc;

pub use apps::{DbBuilder, Provider};
pub use config::Config;
pub use config::Parser as ConfigManager;
pub use rpc::Manager as RpcManager;

use common::helpers;
use common::types::CommonError;

/// WardenRPC is the entrypoint used by the daemon, it owns the parsed and validated configuration
pub struct WardenRPC {
    config: Config,
}

impl WardenRPC {
    pub fn new(conf_file: &str) -> Result<Self, CommonError> {
        let config = ConfigManager::new(conf_file.to_string()).parse()?;
        helpers::validate(config.clone())?;

        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn build_provider(&self) -> Result<Provider, CommonError> {
        Provider::build(self.config.clone()).await
    }

    /// build_rpc_admin registers the admin methods over the provider's control plane
    pub fn build_rpc_admin(&self, provider: &Provider) -> Result<RpcManager, CommonError> {
        let deadline = Duration::from_secs(self.config.app().get_timeout_secs());

        let mut manager = RpcManager::new();
        manager.build_admin_service(provider.control_plane(), deadline)?;
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::common::helpers::testconfig;

    #[test]
    fn test_load_config() {
        let warden = WardenRPC::new(&testconfig::fixture("config.toml")).unwrap();
        assert_eq!(warden.config().app().get_timeout_secs(), 15);
    }

    #[test]
    fn test_load_invalid_config() {
        let result = WardenRPC::new(&testconfig::fixture("config_app.toml"));
        assert!(matches!(result, Err(CommonError::ValidationError(_))));
    }

    #[test]
    fn test_missing_config() {
        let result = WardenRPC::new("/nonexistent/warden.toml");
        assert!(matches!(result, Err(CommonError::ConfigError(_))));
    }
}
