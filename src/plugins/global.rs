//! Chain entry stage: resolves the request's gateway context.
//!
//! Runs before every traffic plugin and never terminates the chain. The
//! resolved rpc type steers every later `skip` decision, so this stage is
//! registered at a negative order and should stay enabled.
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    core::{
        chain::{GatewayPlugin, Next},
        context::{Exchange, GatewayContext, attr, rpc_type},
        result::GatewayError,
    },
    plugins::{names, orders},
    sync::cache::ConfigCache,
};

pub struct GlobalPlugin {
    cache: Arc<ConfigCache>,
}

impl GlobalPlugin {
    pub fn new(cache: Arc<ConfigCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl GatewayPlugin for GlobalPlugin {
    fn named(&self) -> &'static str {
        names::GLOBAL
    }

    fn order(&self) -> i32 {
        orders::GLOBAL
    }

    async fn execute(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<(), GatewayError> {
        let path = exchange.request.path.clone();
        let context = match self.cache.meta_data(&path) {
            Some(meta) if meta.enabled && !meta.rpc_type.is_empty() => {
                tracing::debug!(path = %path, rpc_type = %meta.rpc_type, "metadata route");
                let context = GatewayContext::new(meta.rpc_type.clone(), &path);
                exchange.set_attribute(attr::META_DATA, meta);
                context
            }
            _ => GatewayContext::new(rpc_type::HTTP, &path),
        };
        exchange.set_attribute(attr::CONTEXT, context);
        next.run(exchange).await
    }
}
