//! JSON-RPC Server
//!
//! Serves the generation methods over HTTP on a local TCP port.

use crate::handler::RpcHandler;
use crate::types::{JobIdRequest, ListRequest, SubmitRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use quizgen_core::application::GenerationService;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9631;

/// Method names
pub mod method {
    pub const SUBMIT: &str = "generation.submit.v1";
    pub const CANCEL: &str = "generation.cancel.v1";
    pub const RETRY: &str = "generation.retry.v1";
    pub const OBSERVE: &str = "generation.observe.v1";
    pub const LIST: &str = "generation.list.v1";
    pub const DELETE: &str = "generation.delete.v1";
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to build server on {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("Failed to register RPC method: {0}")]
    Register(String),
}

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

/// Register `$method` with a handler call taking parsed params
macro_rules! register {
    ($module:expr, $handler:expr, $method:expr, $params:ty, $call:ident) => {{
        let handler = Arc::clone(&$handler);
        $module
            .register_async_method($method, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: $params = params.parse()?;
                    handler.$call(req).await
                }
            })
            .map_err(|e| ServerError::Register(format!("{}: {}", $method, e)))?;
    }};
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, service: Arc<GenerationService>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service)),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the handle that
    /// keeps the server alive.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                message: e.to_string(),
            })?;
        let local_addr = server.local_addr().map_err(|e| ServerError::Bind {
            addr: addr.clone(),
            message: e.to_string(),
        })?;

        let mut module = RpcModule::new(());
        register!(module, self.handler, method::SUBMIT, SubmitRequest, submit);
        register!(module, self.handler, method::CANCEL, JobIdRequest, cancel);
        register!(module, self.handler, method::RETRY, JobIdRequest, retry);
        register!(module, self.handler, method::OBSERVE, JobIdRequest, observe);
        register!(module, self.handler, method::LIST, ListRequest, list);
        register!(module, self.handler, method::DELETE, JobIdRequest, delete);

        info!(address = %local_addr, "JSON-RPC server started");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
