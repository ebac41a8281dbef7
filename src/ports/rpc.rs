use async_trait::async_trait;
use thiserror::Error;

use crate::config::models::MetaData;

/// Errors produced by a generic RPC invocation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RpcError {
    /// The service or method named by the metadata does not exist.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The invocation reached the service but failed there.
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// The supplied parameter body did not match the method signature.
    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),
}

/// Port bridging matched non-HTTP routes onto their RPC backends.
///
/// The metadata carries service name, method name and parameter type list;
/// `body` is the raw JSON parameter payload when the method takes any.
#[async_trait]
pub trait RpcInvoker: Send + Sync + 'static {
    async fn invoke(
        &self,
        meta: &MetaData,
        body: Option<&str>,
    ) -> Result<serde_json::Value, RpcError>;
}
