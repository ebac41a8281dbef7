//! The cooperative plugin chain.
//!
//! The engine owns ordering and the "rest of the chain" capability; control
//! flow belongs to the plugins. Each stage receives an explicit [`Next`]
//! continuation and decides whether to invoke it — a stage that writes a
//! terminal response and returns without calling `next.run(..)` ends the
//! request (rate-limit rejections, signature failures). Skipped stages are
//! not errors: `skip` means "this plugin does not apply to this rpc type".
//!
//! Execution is fully asynchronous; a stage may suspend awaiting an RPC
//! response or limiter decision without holding a worker thread. Dropping the
//! chain future (client disconnect) cancels whichever stage was suspended.
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::{
    config::models::{RuleData, SelectorData},
    core::{
        context::Exchange,
        matching::{match_rule, match_selector},
        result::GatewayError,
    },
    sync::cache::ConfigCache,
};

/// One stage of the request-handling chain.
#[async_trait]
pub trait GatewayPlugin: Send + Sync {
    /// Chain-registered name; must match `PluginData.name` to be enabled.
    fn named(&self) -> &'static str;

    /// Ascending execution order.
    fn order(&self) -> i32;

    /// True when this plugin does not apply to the request at all.
    fn skip(&self, _exchange: &Exchange) -> bool {
        false
    }

    /// Run this stage. Invoke `next.run(exchange)` to continue the pipeline,
    /// or return without doing so to terminate it.
    async fn execute(
        &self,
        exchange: &mut Exchange,
        next: Next<'_>,
    ) -> Result<(), GatewayError>;
}

/// The remaining ordered plugin sequence, invokable by the current stage.
pub struct Next<'a> {
    plugins: &'a [Arc<dyn GatewayPlugin>],
}

impl<'a> Next<'a> {
    pub fn new(plugins: &'a [Arc<dyn GatewayPlugin>]) -> Self {
        Self { plugins }
    }

    /// Walk the remaining stages, honoring `skip`, until one takes over or
    /// the chain is exhausted.
    pub fn run<'b>(mut self, exchange: &'b mut Exchange) -> BoxFuture<'b, Result<(), GatewayError>>
    where
        'a: 'b,
    {
        Box::pin(async move {
            while let Some((plugin, rest)) = self.plugins.split_first() {
                self.plugins = rest;
                if plugin.skip(exchange) {
                    tracing::debug!(plugin = plugin.named(), "skipping plugin");
                    continue;
                }
                tracing::debug!(plugin = plugin.named(), "executing plugin");
                return plugin.execute(exchange, Next { plugins: rest }).await;
            }
            Ok(())
        })
    }
}

/// Ordered pipeline over the registered plugins, gated per request by the
/// pushed `PluginData.enabled` flags.
pub struct PluginChain {
    plugins: Vec<Arc<dyn GatewayPlugin>>,
    cache: Arc<ConfigCache>,
}

impl PluginChain {
    pub fn new(mut plugins: Vec<Arc<dyn GatewayPlugin>>, cache: Arc<ConfigCache>) -> Self {
        plugins.sort_by_key(|p| p.order());
        Self { plugins, cache }
    }

    /// Drive one request through the currently-enabled stages.
    pub async fn execute(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        // Snapshot the enabled set once per request so a concurrent config
        // push cannot change the pipeline mid-walk.
        let active: Vec<Arc<dyn GatewayPlugin>> = self
            .plugins
            .iter()
            .filter(|plugin| {
                self.cache
                    .plugin(plugin.named())
                    .map(|data| data.enabled)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Next::new(&active).run(exchange).await
    }
}

/// A plugin whose execution is scoped by selector / rule matching.
///
/// Most traffic plugins are of this shape: the wrapper resolves the two
/// matching tiers against this plugin's own cached selectors and rules, then
/// hands the winners to `do_execute`. Resolution failures short-circuit with
/// the corresponding distinguishable error before the plugin logic runs.
#[async_trait]
pub trait MatchablePlugin: Send + Sync {
    fn named(&self) -> &'static str;

    fn order(&self) -> i32;

    fn skip(&self, _exchange: &Exchange) -> bool {
        false
    }

    async fn do_execute(
        &self,
        exchange: &mut Exchange,
        next: Next<'_>,
        selector: &SelectorData,
        rule: &RuleData,
    ) -> Result<(), GatewayError>;
}

/// Adapter running the two-tier match in front of a [`MatchablePlugin`].
pub struct Routed<P> {
    inner: P,
    cache: Arc<ConfigCache>,
}

impl<P> Routed<P> {
    pub fn new(inner: P, cache: Arc<ConfigCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<P: MatchablePlugin + 'static> GatewayPlugin for Routed<P> {
    fn named(&self) -> &'static str {
        self.inner.named()
    }

    fn order(&self) -> i32 {
        self.inner.order()
    }

    fn skip(&self, exchange: &Exchange) -> bool {
        self.inner.skip(exchange)
    }

    async fn execute(
        &self,
        exchange: &mut Exchange,
        next: Next<'_>,
    ) -> Result<(), GatewayError> {
        let selectors = self.cache.selectors(self.named());
        let selector = match_selector(&selectors, &exchange.request)
            .cloned()
            .ok_or_else(|| GatewayError::NoMatchingSelector {
                plugin: self.named().to_string(),
            })?;
        let rules = self.cache.rules(&selector.id);
        let rule = match_rule(&rules, &exchange.request).cloned().ok_or_else(|| {
            GatewayError::NoMatchingRule {
                plugin: self.named().to_string(),
                selector_id: selector.id.clone(),
            }
        })?;
        tracing::debug!(
            plugin = self.named(),
            selector = %selector.id,
            rule = %rule.id,
            "route resolved"
        );
        self.inner.do_execute(exchange, next, &selector, &rule).await
    }
}
