use std::sync::Arc;
use std::time::Duration;

use prople_warden_core::control::AdminAPI;

use crate::common::types::CommonError;
use crate::rpc::shared::rpc::method::build_rpc_method;
use crate::rpc::shared::rpc::types::{RpcHandler, RpcRoute};
use crate::rpc::shared::types::RPCService;

mod handler;
mod rpc_method;
mod rpc_param;

pub use handler::AdminHandler;
pub use rpc_method::Method;
pub use rpc_param::Param;

pub struct Admin<TAdmin>
where
    TAdmin: AdminAPI + Clone + 'static,
{
    admin_api: TAdmin,
    deadline: Duration,
    handler: Option<Arc<dyn RpcHandler>>,
    routes: Vec<RpcRoute>,
}

impl<TAdmin> Admin<TAdmin>
where
    TAdmin: AdminAPI + Clone + 'static,
{
    pub fn new(admin_api: TAdmin, deadline: Duration) -> Self {
        Self {
            admin_api,
            deadline,
            handler: None,
            routes: Vec::new(),
        }
    }
}

impl<TAdmin> RPCService for Admin<TAdmin>
where
    TAdmin: AdminAPI + Clone + 'static,
{
    fn build(&mut self) -> Result<(), CommonError> {
        if self.deadline.is_zero() {
            return Err(CommonError::RpcError(String::from(
                "admin: deadline must be greater than zero",
            )));
        }

        let handler = AdminHandler::new(self.admin_api.clone(), self.deadline);
        self.handler = Some(Arc::new(handler));
        Ok(())
    }

    fn setup_rpc(&mut self) -> Result<(), CommonError> {
        let handler = self
            .handler
            .clone()
            .ok_or(CommonError::RpcError(String::from("admin: handler is not built")))?;

        self.routes = Method::all()
            .into_iter()
            .map(|method| RpcRoute::new(build_rpc_method(method), handler.clone()))
            .collect();

        Ok(())
    }

    fn routes(&self) -> Vec<RpcRoute> {
        self.routes.clone()
    }
}
