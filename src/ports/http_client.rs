use async_trait::async_trait;
use thiserror::Error;

use crate::core::context::{GatewayResponse, RequestInfo};

/// Errors an outbound HTTP invocation can produce.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// The backend could not be reached at all.
    #[error("connection error: {0}")]
    Connection(String),

    /// The rewritten target could not be turned into a valid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be read back.
    #[error("body error: {0}")]
    Body(String),
}

pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// Port for forwarding a matched request to its resolved upstream url.
///
/// The caller owns timeout and retry policy; implementations perform exactly
/// one attempt per call and surface transport failures as errors rather than
/// synthetic responses.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Forward `request` to the absolute `url`, echoing method, headers,
    /// query string and body.
    async fn forward(&self, request: &RequestInfo, url: &str) -> HttpClientResult<GatewayResponse>;
}
