//! Local caches mirroring control-plane configuration.
//!
//! Each entity kind has its own map; values are snapshot vectors
//! (`Arc<Vec<_>>`) so a request-path reader sees either the pre-update or the
//! post-update list for a key, never a torn mix. Selector lists are keyed by
//! plugin name and rule lists by selector id, both kept sorted by `sort`
//! ascending (stable, so equal sorts preserve push order) — the matching
//! engine relies on that ordering for its deterministic tie-break.
use std::sync::Arc;

use scc::HashMap;

use crate::{
    config::models::{MetaData, PluginData, RuleData, SelectorData},
    utils::path_match,
};

#[derive(Default)]
pub struct ConfigCache {
    plugins: HashMap<String, PluginData>,
    selectors: HashMap<String, Arc<Vec<SelectorData>>>,
    rules: HashMap<String, Arc<Vec<RuleData>>>,
    metadata: HashMap<String, MetaData>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    // --- plugins ---

    pub fn plugin(&self, name: &str) -> Option<PluginData> {
        self.plugins.read_sync(name, |_, data| data.clone())
    }

    pub fn cache_plugin(&self, data: PluginData) {
        self.plugins
            .entry_sync(data.name.clone())
            .and_modify(|existing| *existing = data.clone())
            .or_insert(data);
    }

    pub fn remove_plugin(&self, name: &str) {
        self.plugins.remove_sync(name);
    }

    pub fn clear_plugins(&self) {
        self.plugins.clear_sync();
    }

    // --- selectors ---

    /// Sorted selector list for one plugin. Empty when nothing was pushed.
    pub fn selectors(&self, plugin_name: &str) -> Arc<Vec<SelectorData>> {
        self.selectors
            .read_sync(plugin_name, |_, list| list.clone())
            .unwrap_or_default()
    }

    pub fn cache_selector(&self, selector: SelectorData) {
        let plugin_name = selector.plugin_name.clone();
        self.selectors
            .entry_sync(plugin_name)
            .and_modify(|list| *list = Self::upsert_sorted(list, selector.clone(), |s| &s.id, |s| s.sort))
            .or_insert_with(|| Arc::new(vec![selector]));
    }

    pub fn remove_selector(&self, selector: &SelectorData) {
        self.selectors.update_sync(&selector.plugin_name, |_, list| {
            let remaining: Vec<SelectorData> = list
                .iter()
                .filter(|s| s.id != selector.id)
                .cloned()
                .collect();
            *list = Arc::new(remaining);
        });
    }

    pub fn clear_selectors(&self) {
        self.selectors.clear_sync();
    }

    // --- rules ---

    /// Sorted rule list for one selector. A rule whose selector has been
    /// deleted simply never resolves: unroutable, not fatal.
    pub fn rules(&self, selector_id: &str) -> Arc<Vec<RuleData>> {
        self.rules
            .read_sync(selector_id, |_, list| list.clone())
            .unwrap_or_default()
    }

    pub fn cache_rule(&self, rule: RuleData) {
        let selector_id = rule.selector_id.clone();
        self.rules
            .entry_sync(selector_id)
            .and_modify(|list| *list = Self::upsert_sorted(list, rule.clone(), |r| &r.id, |r| r.sort))
            .or_insert_with(|| Arc::new(vec![rule]));
    }

    pub fn remove_rule(&self, rule: &RuleData) {
        self.rules.update_sync(&rule.selector_id, |_, list| {
            let remaining: Vec<RuleData> =
                list.iter().filter(|r| r.id != rule.id).cloned().collect();
            *list = Arc::new(remaining);
        });
    }

    pub fn clear_rules(&self) {
        self.rules.clear_sync();
    }

    // --- metadata ---

    /// Metadata lookup by exact path, falling back to ant-style patterns in
    /// registered paths.
    pub fn meta_data(&self, path: &str) -> Option<MetaData> {
        if let Some(meta) = self.metadata.read_sync(path, |_, meta| meta.clone()) {
            return Some(meta);
        }
        let mut found = None;
        self.metadata.any_sync(|registered, meta| {
            if registered.contains('*') && path_match::matches(registered, path) {
                found = Some(meta.clone());
                return true;
            }
            false
        });
        found
    }

    pub fn cache_meta_data(&self, meta: MetaData) {
        self.metadata
            .entry_sync(meta.path.clone())
            .and_modify(|existing| *existing = meta.clone())
            .or_insert(meta);
    }

    pub fn remove_meta_data(&self, meta: &MetaData) {
        self.metadata.remove_sync(&meta.path);
    }

    pub fn clear_meta_data(&self) {
        self.metadata.clear_sync();
    }

    fn upsert_sorted<T: Clone>(
        list: &Arc<Vec<T>>,
        entity: T,
        id: impl Fn(&T) -> &str,
        sort: impl Fn(&T) -> i32,
    ) -> Arc<Vec<T>> {
        let mut next: Vec<T> = list
            .iter()
            .filter(|existing| id(existing) != id(&entity))
            .cloned()
            .collect();
        next.push(entity);
        next.sort_by_key(|item| sort(item));
        Arc::new(next)
    }
}
