use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use super::types::{
    RpcError, RpcHandler, RpcMethod, RpcRequest, RpcResponse, RpcRoute, JSONRPC_VERSION,
};

/// RpcProcessor maps method names to their handlers and executes single requests
#[derive(Clone, Default)]
pub struct RpcProcessor {
    routes: HashMap<RpcMethod, Arc<dyn RpcHandler>>,
}

impl RpcProcessor {
    pub fn register_route(&mut self, route: RpcRoute) {
        self.routes.insert(route.method, route.handler);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// execute_raw parses a request body, parse failures still answer with a JSON-RPC error
    pub async fn execute_raw(&self, body: &[u8]) -> RpcResponse {
        match serde_json::from_slice::<RpcRequest>(body) {
            Ok(request) => self.execute(request).await,
            Err(err) => {
                debug!("unparseable rpc request: {}", err);
                RpcResponse::failure(None, &RpcError::ParseError)
            }
        }
    }

    pub async fn execute(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        if request.jsonrpc != JSONRPC_VERSION {
            return RpcResponse::failure(id, &RpcError::InvalidRequest);
        }

        let method = RpcMethod::from(request.method);
        let Some(handler) = self.routes.get(&method) else {
            warn!("rpc method not found: {}", method);
            return RpcResponse::failure(id, &RpcError::MethodNotFound);
        };

        match handler.call(method.clone(), request.params).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => {
                debug!("rpc method {} failed: {}", method, err);
                RpcResponse::failure(id, &err)
            }
        }
    }

    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.routes.keys().map(|m| m.to_string()).collect();
        methods.sort();
        methods
    }
}

/// value_of converts a handler result into its JSON form
pub fn value_of<T: serde::Serialize>(result: T) -> Result<Option<Value>, RpcError> {
    serde_json::to_value(result)
        .map(Some)
        .map_err(|_| RpcError::InternalError)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;

    use crate::rpc::shared::rpc::types::RpcHandlerOutput;

    mock!(
        FakeHandler{}

        #[async_trait]
        impl RpcHandler for FakeHandler {
            async fn call(&self, method: RpcMethod, params: Option<Value>) -> RpcHandlerOutput;
        }
    );

    fn build_processor(handler: MockFakeHandler) -> RpcProcessor {
        let mut processor = RpcProcessor::default();
        processor.register_route(RpcRoute::new(
            RpcMethod::from("prople.warden.test.echo"),
            Arc::new(handler),
        ));
        processor
    }

    #[tokio::test]
    async fn test_execute_routes_to_handler() {
        let mut handler = MockFakeHandler::new();
        handler
            .expect_call()
            .times(1)
            .returning(|_, params| Ok(params));

        let processor = build_processor(handler);
        let response = processor
            .execute_raw(
                br#"{"jsonrpc":"2.0","method":"prople.warden.test.echo","params":{"a":1},"id":7}"#,
            )
            .await;

        assert_eq!(response.id, Some(json!(7)));
        assert_eq!(response.result, Some(json!({"a": 1})));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_execute_errors() {
        let processor = build_processor(MockFakeHandler::new());

        let response = processor.execute_raw(b"not json").await;
        assert_eq!(response.error.unwrap().code, -32700);

        let response = processor
            .execute_raw(br#"{"jsonrpc":"2.0","method":"prople.warden.nope","id":1}"#)
            .await;
        assert_eq!(response.error.unwrap().code, -32601);

        let response = processor
            .execute_raw(br#"{"jsonrpc":"1.0","method":"prople.warden.test.echo","id":1}"#)
            .await;
        assert_eq!(response.error.unwrap().code, -32600);
    }
}
