//! Ports (trait interfaces) the plugin stages invoke through.
//!
//! Plugins never talk to concrete clients: the terminal HTTP stage speaks
//! through [`http_client::HttpClient`], the RPC bridge through
//! [`rpc::RpcInvoker`], the limiter through [`rate_limit::RateLimitStore`].
//! Adapters provide the production implementations; tests substitute
//! recording stubs.
pub mod http_client;
pub mod rate_limit;
pub mod rpc;

pub use http_client::{HttpClient, HttpClientError, HttpClientResult};
pub use rate_limit::{RateLimitDecision, RateLimitStore, RateLimitStoreError};
pub use rpc::{RpcError, RpcInvoker};
