//! Gateway assembly: caches, chain, sync wiring.
//!
//! One [`Gateway`] owns one config cache, one upstream cache and one
//! singleton registry; everything else holds `Arc` handles into it. Multiple
//! gateways can coexist in a process (tests run them side by side) because no
//! state is ambient.
use std::sync::Arc;

use crate::{
    config::models::{MetaData, PluginData, RuleData, SelectorData},
    core::{
        chain::{GatewayPlugin, PluginChain, Routed},
        context::{Exchange, GatewayResponse, RequestInfo},
        result::GatewayError,
        upstream::UpstreamCache,
    },
    plugins::{
        DividePlugin, DivideSelectorHandler, DubboPlugin, GlobalPlugin, RateLimiterConfigHandler,
        RateLimiterPlugin, WebClientPlugin,
    },
    ports::{http_client::HttpClient, rate_limit::RateLimitStore, rpc::RpcInvoker},
    sync::{
        cache::ConfigCache,
        handler::{EntityHandler, SyncDispatcher},
        subscriber::{CacheSubscriber, DataSubscriber, PluginConfigHandler},
    },
    utils::singleton::SingletonRegistry,
};

/// Concrete backends the built-in plugins speak through.
pub struct GatewayBackends {
    pub http_client: Arc<dyn HttpClient>,
    pub rpc_invoker: Arc<dyn RpcInvoker>,
    pub rate_limit_store: Arc<dyn RateLimitStore>,
}

pub struct Gateway {
    cache: Arc<ConfigCache>,
    upstreams: Arc<UpstreamCache>,
    registry: Arc<SingletonRegistry>,
    chain: PluginChain,
}

impl Gateway {
    /// Assemble a gateway with the built-in plugin set and a fresh registry.
    pub fn new(backends: GatewayBackends) -> Self {
        Self::with_registry(backends, Arc::new(SingletonRegistry::new()))
    }

    /// Assemble around an externally-created registry, for callers whose
    /// backends already hold a handle to it.
    pub fn with_registry(backends: GatewayBackends, registry: Arc<SingletonRegistry>) -> Self {
        let cache = Arc::new(ConfigCache::new());
        let upstreams = Arc::new(UpstreamCache::new());

        let plugins: Vec<Arc<dyn GatewayPlugin>> = vec![
            Arc::new(GlobalPlugin::new(cache.clone())),
            Arc::new(Routed::new(
                RateLimiterPlugin::new(backends.rate_limit_store),
                cache.clone(),
            )),
            Arc::new(Routed::new(
                DividePlugin::new(upstreams.clone()),
                cache.clone(),
            )),
            Arc::new(Routed::new(
                DubboPlugin::new(backends.rpc_invoker),
                cache.clone(),
            )),
            Arc::new(WebClientPlugin::new(backends.http_client)),
        ];
        let chain = PluginChain::new(plugins, cache.clone());

        Self {
            cache,
            upstreams,
            registry,
            chain,
        }
    }

    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    pub fn upstreams(&self) -> &Arc<UpstreamCache> {
        &self.upstreams
    }

    pub fn registry(&self) -> &Arc<SingletonRegistry> {
        &self.registry
    }

    /// Build the sync dispatcher feeding this gateway's caches. The divide
    /// and rate limiter plugins get their config hooks registered here.
    pub fn sync_dispatcher(&self) -> SyncDispatcher {
        let handlers: Vec<Arc<dyn PluginConfigHandler>> = vec![
            Arc::new(DivideSelectorHandler::new(self.upstreams.clone())),
            Arc::new(RateLimiterConfigHandler::new(self.registry.clone())),
        ];
        let subscriber = Arc::new(CacheSubscriber::new(self.cache.clone(), handlers));
        SyncDispatcher::new(
            EntityHandler::new(
                "plugin",
                vec![subscriber.clone() as Arc<dyn DataSubscriber<PluginData>>],
            ),
            EntityHandler::new(
                "selector",
                vec![subscriber.clone() as Arc<dyn DataSubscriber<SelectorData>>],
            ),
            EntityHandler::new(
                "rule",
                vec![subscriber.clone() as Arc<dyn DataSubscriber<RuleData>>],
            ),
            EntityHandler::new(
                "metadata",
                vec![subscriber as Arc<dyn DataSubscriber<MetaData>>],
            ),
        )
    }

    /// Drive one request through the chain. Routing failures become their
    /// structured bodies here; nothing escapes as a transport error.
    pub async fn handle(&self, request: RequestInfo) -> GatewayResponse {
        let mut exchange = Exchange::new(request);
        match self.chain.execute(&mut exchange).await {
            Ok(()) => exchange
                .take_response()
                .unwrap_or_else(|| GatewayResponse::success(serde_json::Value::Null)),
            Err(err) => self.error_response(err),
        }
    }

    fn error_response(&self, err: GatewayError) -> GatewayResponse {
        let code = err.result_code();
        tracing::warn!(%err, code = code.code(), "request terminated with error");
        GatewayResponse::from_result_code(code)
    }
}
