use std::time::Duration;

use log::info;

use prople_warden_core::control::AdminAPI;

use crate::common::types::CommonError;

use super::admin::Admin;
use super::shared::rpc::processor::RpcProcessor;
use super::shared::types::RPCService;

/// Manager assembles the JSON-RPC processor from the services the process exposes
pub struct Manager {
    processor: RpcProcessor,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Self {
        let processor = RpcProcessor::default();
        Self { processor }
    }

    pub fn build_admin_service<TAdmin>(
        &mut self,
        admin_api: TAdmin,
        deadline: Duration,
    ) -> Result<&mut Self, CommonError>
    where
        TAdmin: AdminAPI + Clone + 'static,
    {
        let mut admin_rpc = Admin::new(admin_api, deadline);

        admin_rpc.build()?;
        admin_rpc.setup_rpc()?;
        let routes = admin_rpc.routes();

        if routes.is_empty() {
            return Err(CommonError::RpcError(String::from(
                "admin doesn't have any routes",
            )));
        }

        for route in routes.iter() {
            self.processor.register_route(route.clone());
        }

        info!("admin rpc registered {} methods", routes.len());
        Ok(self)
    }

    pub fn processor(&self) -> RpcProcessor {
        self.processor.clone()
    }
}
