//! Synapse - a dynamically-configured API gateway.
//!
//! Synapse routes traffic through an ordered, cooperative plugin chain whose
//! behavior is driven entirely by configuration pushed from a control plane:
//! selectors and rules decide which plugins apply to a request, upstream
//! pools and load balancing decide where it goes, and metadata bridges
//! matched routes onto non-HTTP RPC backends.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use synapse::{
//!     adapters::{LocalRateLimitStore, ReqwestHttpClient},
//!     core::gateway::{Gateway, GatewayBackends},
//! };
//!
//! # use async_trait::async_trait;
//! # struct NoRpc;
//! # #[async_trait]
//! # impl synapse::ports::rpc::RpcInvoker for NoRpc {
//! #     async fn invoke(&self, _m: &synapse::config::models::MetaData, _b: Option<&str>)
//! #         -> Result<serde_json::Value, synapse::ports::rpc::RpcError> {
//! #         Err(synapse::ports::rpc::RpcError::UnknownService("none".into()))
//! #     }
//! # }
//! # fn main() -> eyre::Result<()> {
//! let gateway = Arc::new(Gateway::new(GatewayBackends {
//!     http_client: Arc::new(ReqwestHttpClient::new()?),
//!     rpc_invoker: Arc::new(NoRpc),
//!     rate_limit_store: Arc::new(LocalRateLimitStore::new()),
//! }));
//! let dispatcher = gateway.sync_dispatcher();
//! // Feed dispatcher from your push source; serve via adapters::HttpHandler.
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping routing logic inside `core`. Configuration entities and the
//! sync protocol live in `config::models` and `sync`.
//!
//! # Error Handling
//! The routing core returns `core::result::GatewayError`; every variant maps
//! to a stable `{code, message}` body, so a request always ends in a
//! structured response. `eyre` is used only at the binary boundary.
//!
//! # Concurrency & Data Structures
//! Shared mutable maps use `scc::HashMap` with `Arc`-snapshot values so
//! request-path readers never observe a torn configuration update.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;
pub mod plugins;
pub mod sync;

pub use crate::{
    adapters::{
        HttpBridgeRpcInvoker, HttpHandler, LocalRateLimitStore, RedisRateLimitStore,
        RegistryRateLimitStore, ReqwestHttpClient, SyncClient,
    },
    core::{
        Gateway,
        chain::{GatewayPlugin, MatchablePlugin, Next, PluginChain},
        gateway::GatewayBackends,
    },
    sync::handler::SyncDispatcher,
};
