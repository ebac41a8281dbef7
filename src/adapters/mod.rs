//! Adapters: production implementations of the ports plus the inbound HTTP
//! surface and the sync transport client.
pub mod http_client;
pub mod http_handler;
pub mod rate_limit_store;
pub mod rpc_invoker;
pub mod sync_websocket;

pub use http_client::ReqwestHttpClient;
pub use http_handler::HttpHandler;
pub use rate_limit_store::{LocalRateLimitStore, RedisRateLimitStore, RegistryRateLimitStore};
pub use rpc_invoker::HttpBridgeRpcInvoker;
pub use sync_websocket::SyncClient;
