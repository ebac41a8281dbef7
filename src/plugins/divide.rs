//! HTTP load-balancing stage.
//!
//! Picks one healthy upstream for the matched selector and rewrites the
//! exchange's target url; the actual invocation happens later in the
//! web client stage. Applies only to plain-HTTP traffic.
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::models::{DivideRuleHandle, RuleData, SelectorData, Upstream},
    core::{
        chain::{MatchablePlugin, Next},
        context::{Exchange, attr, rpc_type},
        result::GatewayError,
        upstream::UpstreamCache,
    },
    plugins::{names, orders},
    sync::subscriber::PluginConfigHandler,
};

pub struct DividePlugin {
    upstreams: Arc<UpstreamCache>,
}

impl DividePlugin {
    pub fn new(upstreams: Arc<UpstreamCache>) -> Self {
        Self { upstreams }
    }

    fn parse_handle(rule: &RuleData) -> DivideRuleHandle {
        if rule.handle.trim().is_empty() {
            return DivideRuleHandle::default();
        }
        serde_json::from_str(&rule.handle).unwrap_or_else(|err| {
            tracing::warn!(rule = %rule.id, %err, "bad divide handle, using defaults");
            DivideRuleHandle::default()
        })
    }

    fn real_url(upstream: &Upstream, path: &str) -> String {
        if upstream.url.starts_with("http://") || upstream.url.starts_with("https://") {
            format!("{}{path}", upstream.url.trim_end_matches('/'))
        } else {
            format!("http://{}{path}", upstream.url.trim_end_matches('/'))
        }
    }
}

#[async_trait]
impl MatchablePlugin for DividePlugin {
    fn named(&self) -> &'static str {
        names::DIVIDE
    }

    fn order(&self) -> i32 {
        orders::DIVIDE
    }

    fn skip(&self, exchange: &Exchange) -> bool {
        exchange.rpc_type() != rpc_type::HTTP
    }

    async fn do_execute(
        &self,
        exchange: &mut Exchange,
        next: Next<'_>,
        selector: &SelectorData,
        rule: &RuleData,
    ) -> Result<(), GatewayError> {
        let handle = Self::parse_handle(rule);
        let key = exchange.request.hash_key();
        let chosen = self
            .upstreams
            .choose(&selector.id, handle.load_balance, &key)?;
        let url = Self::real_url(&chosen, &exchange.request.path);
        tracing::debug!(selector = %selector.id, upstream = %chosen.url, "upstream chosen");

        if let Some(context) = exchange.context_mut() {
            context.real_url = url;
        }
        exchange.set_attribute(attr::HTTP_TIMEOUT, handle.timeout);
        exchange.set_attribute(attr::HTTP_RETRY, handle.retry);
        next.run(exchange).await
    }
}

/// Keeps the upstream pools in step with this plugin's pushed selectors.
/// A selector's `handle` carries its upstream list as JSON.
pub struct DivideSelectorHandler {
    upstreams: Arc<UpstreamCache>,
}

impl DivideSelectorHandler {
    pub fn new(upstreams: Arc<UpstreamCache>) -> Self {
        Self { upstreams }
    }
}

impl PluginConfigHandler for DivideSelectorHandler {
    fn plugin_named(&self) -> &'static str {
        names::DIVIDE
    }

    fn handle_selector(&self, selector: &SelectorData) -> Result<(), GatewayError> {
        if selector.handle.trim().is_empty() {
            self.upstreams.submit(&selector.id, Vec::new());
            return Ok(());
        }
        let pool: Vec<Upstream> = serde_json::from_str(&selector.handle).map_err(|err| {
            GatewayError::MalformedConfig(format!("upstream list for {}: {err}", selector.id))
        })?;
        self.upstreams.submit(&selector.id, pool);
        Ok(())
    }

    fn remove_selector(&self, selector: &SelectorData) -> Result<(), GatewayError> {
        self.upstreams.remove(&selector.id);
        Ok(())
    }
}
