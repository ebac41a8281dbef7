//! Subscribers reacting to pushed configuration.
//!
//! [`DataSubscriber`] is the notification seam the handlers fan out through.
//! [`CacheSubscriber`] is the standard implementation: it applies every
//! entity to the local [`ConfigCache`] and forwards plugin-scoped events to
//! the [`PluginConfigHandler`] registered under the matching plugin name
//! (unknown names are cached but otherwise ignored).
use std::{collections::HashMap, sync::Arc};

use crate::{
    config::models::{MetaData, PluginData, RuleData, SelectorData},
    core::result::GatewayError,
    sync::cache::ConfigCache,
};

/// Notification surface for one entity kind. `on_subscribe` fires for both
/// fresh and updated entities; `un_subscribe` fires on delete; `refresh`
/// resets subscriber-local state before a full re-subscription pass.
pub trait DataSubscriber<T>: Send + Sync {
    fn on_subscribe(&self, entity: &T) -> Result<(), GatewayError>;

    fn un_subscribe(&self, entity: &T) -> Result<(), GatewayError>;

    fn refresh(&self, _entities: &[T]) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Per-plugin hook for reacting to its own pushed configuration. The name
/// must equal the plugin's chain-registered name. All methods default to
/// no-ops; plugins override what they care about (the rate limiter rebuilds
/// its backend client in `handle_plugin`, the divide plugin maintains its
/// upstream pools in `handle_selector`).
pub trait PluginConfigHandler: Send + Sync {
    fn plugin_named(&self) -> &'static str;

    fn handle_plugin(&self, _data: &PluginData) -> Result<(), GatewayError> {
        Ok(())
    }

    fn remove_plugin(&self, _data: &PluginData) -> Result<(), GatewayError> {
        Ok(())
    }

    fn handle_selector(&self, _selector: &SelectorData) -> Result<(), GatewayError> {
        Ok(())
    }

    fn remove_selector(&self, _selector: &SelectorData) -> Result<(), GatewayError> {
        Ok(())
    }

    fn handle_rule(&self, _rule: &RuleData) -> Result<(), GatewayError> {
        Ok(())
    }

    fn remove_rule(&self, _rule: &RuleData) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Applies pushed entities to the shared config cache and routes
/// plugin-scoped events to interested plugin handlers.
pub struct CacheSubscriber {
    cache: Arc<ConfigCache>,
    handlers: HashMap<&'static str, Arc<dyn PluginConfigHandler>>,
}

impl CacheSubscriber {
    pub fn new(cache: Arc<ConfigCache>, handlers: Vec<Arc<dyn PluginConfigHandler>>) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|h| (h.plugin_named(), h))
            .collect();
        Self { cache, handlers }
    }

    fn handler(&self, plugin_name: &str) -> Option<&Arc<dyn PluginConfigHandler>> {
        self.handlers.get(plugin_name)
    }
}

impl DataSubscriber<PluginData> for CacheSubscriber {
    fn on_subscribe(&self, data: &PluginData) -> Result<(), GatewayError> {
        self.cache.cache_plugin(data.clone());
        if let Some(handler) = self.handler(&data.name) {
            handler.handle_plugin(data)?;
        }
        Ok(())
    }

    fn un_subscribe(&self, data: &PluginData) -> Result<(), GatewayError> {
        self.cache.remove_plugin(&data.name);
        if let Some(handler) = self.handler(&data.name) {
            handler.remove_plugin(data)?;
        }
        Ok(())
    }

    fn refresh(&self, _entities: &[PluginData]) -> Result<(), GatewayError> {
        self.cache.clear_plugins();
        Ok(())
    }
}

impl DataSubscriber<SelectorData> for CacheSubscriber {
    fn on_subscribe(&self, selector: &SelectorData) -> Result<(), GatewayError> {
        self.cache.cache_selector(selector.clone());
        if let Some(handler) = self.handler(&selector.plugin_name) {
            handler.handle_selector(selector)?;
        }
        Ok(())
    }

    fn un_subscribe(&self, selector: &SelectorData) -> Result<(), GatewayError> {
        self.cache.remove_selector(selector);
        if let Some(handler) = self.handler(&selector.plugin_name) {
            handler.remove_selector(selector)?;
        }
        Ok(())
    }

    fn refresh(&self, _entities: &[SelectorData]) -> Result<(), GatewayError> {
        self.cache.clear_selectors();
        Ok(())
    }
}

impl DataSubscriber<RuleData> for CacheSubscriber {
    fn on_subscribe(&self, rule: &RuleData) -> Result<(), GatewayError> {
        self.cache.cache_rule(rule.clone());
        if let Some(handler) = self.handler(&rule.plugin_name) {
            handler.handle_rule(rule)?;
        }
        Ok(())
    }

    fn un_subscribe(&self, rule: &RuleData) -> Result<(), GatewayError> {
        self.cache.remove_rule(rule);
        if let Some(handler) = self.handler(&rule.plugin_name) {
            handler.remove_rule(rule)?;
        }
        Ok(())
    }

    fn refresh(&self, _entities: &[RuleData]) -> Result<(), GatewayError> {
        self.cache.clear_rules();
        Ok(())
    }
}

impl DataSubscriber<MetaData> for CacheSubscriber {
    fn on_subscribe(&self, meta: &MetaData) -> Result<(), GatewayError> {
        self.cache.cache_meta_data(meta.clone());
        Ok(())
    }

    fn un_subscribe(&self, meta: &MetaData) -> Result<(), GatewayError> {
        self.cache.remove_meta_data(meta);
        Ok(())
    }

    fn refresh(&self, _entities: &[MetaData]) -> Result<(), GatewayError> {
        self.cache.clear_meta_data();
        Ok(())
    }
}
