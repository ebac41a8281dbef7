//! Pluggable upstream selection strategies.
//!
//! Strategies operate on the already health-filtered member list of one
//! selector's pool. Round-robin keeps its cursor per strategy instance (the
//! upstream cache holds one instance per selector), weighted-random respects
//! configured weights, and consistent-hash pins a key (client ip) to a ring
//! position so membership changes only remap a fraction of keys.
use std::{
    hash::{DefaultHasher, Hash, Hasher},
    sync::atomic::{AtomicUsize, Ordering},
};

use rand::Rng;

use crate::config::models::{LoadBalanceKind, Upstream};

/// Trait defining the interface for load balancing strategies.
pub trait LoadBalance: Send + Sync + 'static {
    /// Select one upstream for the given hash key.
    fn select<'a>(&self, upstreams: &'a [Upstream], key: &str) -> Option<&'a Upstream>;

    /// Box this strategy as a trait object.
    fn boxed(self) -> Box<dyn LoadBalance>
    where
        Self: Sized,
    {
        Box::new(self)
    }
}

/// Round-robin across the member list.
#[derive(Default)]
pub struct RoundRobinBalancer {
    cursor: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalance for RoundRobinBalancer {
    fn select<'a>(&self, upstreams: &'a [Upstream], _key: &str) -> Option<&'a Upstream> {
        if upstreams.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % upstreams.len();
        upstreams.get(index)
    }
}

/// Weight-proportional random selection. Non-positive weights are treated as
/// zero; an all-zero pool degrades to uniform random.
#[derive(Default)]
pub struct WeightedRandomBalancer;

impl WeightedRandomBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalance for WeightedRandomBalancer {
    fn select<'a>(&self, upstreams: &'a [Upstream], _key: &str) -> Option<&'a Upstream> {
        if upstreams.is_empty() {
            return None;
        }
        let total: i64 = upstreams.iter().map(|u| u.weight.max(0) as i64).sum();
        if total == 0 {
            let index = rand::rng().random_range(0..upstreams.len());
            return upstreams.get(index);
        }
        let mut ticket = rand::rng().random_range(0..total);
        for upstream in upstreams {
            let weight = upstream.weight.max(0) as i64;
            if ticket < weight {
                return Some(upstream);
            }
            ticket -= weight;
        }
        upstreams.last()
    }
}

const VIRTUAL_NODES: u32 = 5;

/// Consistent hashing over a virtual-node ring keyed by upstream url.
#[derive(Default)]
pub struct ConsistentHashBalancer;

impl ConsistentHashBalancer {
    pub fn new() -> Self {
        Self
    }

    fn hash<T: Hash + ?Sized>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }
}

impl LoadBalance for ConsistentHashBalancer {
    fn select<'a>(&self, upstreams: &'a [Upstream], key: &str) -> Option<&'a Upstream> {
        if upstreams.is_empty() {
            return None;
        }
        let mut ring: Vec<(u64, &Upstream)> = upstreams
            .iter()
            .flat_map(|u| {
                (0..VIRTUAL_NODES).map(move |i| (Self::hash(&format!("{}#{i}", u.url)), u))
            })
            .collect();
        ring.sort_by_key(|(position, _)| *position);

        let target = Self::hash(key);
        ring.iter()
            .find(|(position, _)| *position >= target)
            .or_else(|| ring.first())
            .map(|(_, upstream)| *upstream)
    }
}

/// Factory creating a strategy instance for a configured kind.
pub struct LoadBalancerFactory;

impl LoadBalancerFactory {
    pub fn create(kind: LoadBalanceKind) -> Box<dyn LoadBalance> {
        match kind {
            LoadBalanceKind::RoundRobin => RoundRobinBalancer::new().boxed(),
            LoadBalanceKind::Random => WeightedRandomBalancer::new().boxed(),
            LoadBalanceKind::Hash => ConsistentHashBalancer::new().boxed(),
        }
    }
}
