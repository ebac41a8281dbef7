//! Per-selector upstream pools backing the load-balancing plugins.
//!
//! One cache instance exists per gateway and is shared by handle between the
//! sync subscriber (writer) and in-flight requests (readers). Pools are
//! snapshots (`Arc<Vec<Upstream>>`) replaced wholesale on submit, so a
//! concurrent reader observes either the previous or the new member set and
//! never a partially-updated one.
use std::sync::Arc;

use chrono::Utc;
use scc::HashMap;

use crate::{
    config::models::{LoadBalanceKind, Upstream},
    core::{
        load_balancer::{LoadBalance, LoadBalancerFactory},
        result::GatewayError,
    },
};

#[derive(Default)]
pub struct UpstreamCache {
    pools: HashMap<String, Arc<Vec<Upstream>>>,
    // Strategy instances are cached per selector so round-robin cursors
    // survive across requests. Replaced when the configured kind changes.
    balancers: HashMap<String, (LoadBalanceKind, Arc<dyn LoadBalance>)>,
}

impl UpstreamCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the pool for `selector_id`. Entries without a
    /// control-plane timestamp are stamped on arrival.
    pub fn submit(&self, selector_id: &str, mut upstreams: Vec<Upstream>) {
        let now = Utc::now().timestamp_millis();
        for upstream in &mut upstreams {
            if upstream.timestamp == 0 {
                upstream.timestamp = now;
            }
        }
        let snapshot = Arc::new(upstreams);
        self.pools
            .entry_sync(selector_id.to_string())
            .and_modify(|pool| *pool = snapshot.clone())
            .or_insert(snapshot);
    }

    /// Drop the pool for `selector_id` (selector deleted upstream-side).
    pub fn remove(&self, selector_id: &str) {
        self.pools.remove_sync(selector_id);
        self.balancers.remove_sync(selector_id);
    }

    /// Current pool snapshot, if any.
    pub fn get(&self, selector_id: &str) -> Option<Arc<Vec<Upstream>>> {
        self.pools.read_sync(selector_id, |_, pool| pool.clone())
    }

    /// Select one healthy upstream using the configured strategy.
    pub fn choose(
        &self,
        selector_id: &str,
        kind: LoadBalanceKind,
        key: &str,
    ) -> Result<Upstream, GatewayError> {
        let pool = self
            .get(selector_id)
            .ok_or_else(|| GatewayError::NoAvailableUpstream {
                selector_id: selector_id.to_string(),
            })?;
        let healthy: Vec<Upstream> = pool.iter().filter(|u| u.healthy()).cloned().collect();
        if healthy.is_empty() {
            return Err(GatewayError::NoAvailableUpstream {
                selector_id: selector_id.to_string(),
            });
        }
        let balancer = self.balancer(selector_id, kind);
        balancer
            .select(&healthy, key)
            .cloned()
            .ok_or_else(|| GatewayError::NoAvailableUpstream {
                selector_id: selector_id.to_string(),
            })
    }

    fn balancer(&self, selector_id: &str, kind: LoadBalanceKind) -> Arc<dyn LoadBalance> {
        if let Some(existing) =
            self.balancers
                .read_sync(selector_id, |_, (cached_kind, balancer)| {
                    (*cached_kind == kind).then(|| balancer.clone())
                })
                .flatten()
        {
            return existing;
        }
        let fresh: Arc<dyn LoadBalance> = Arc::from(LoadBalancerFactory::create(kind));
        self.balancers
            .entry_sync(selector_id.to_string())
            .and_modify(|entry| *entry = (kind, fresh.clone()))
            .or_insert((kind, fresh.clone()));
        fresh
    }
}
