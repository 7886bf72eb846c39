use crate::common::types::CommonError;

use super::rpc::types::RpcRoute;

pub trait RPCService {
    fn build(&mut self) -> Result<(), CommonError>;
    fn setup_rpc(&mut self) -> Result<(), CommonError>;
    fn routes(&self) -> Vec<RpcRoute>;
}
