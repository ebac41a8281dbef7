//! Token-bucket store implementations.
//!
//! [`RedisRateLimitStore`] keeps bucket state in redis so limits hold across
//! gateway nodes; the refill math runs inside a Lua script for atomicity.
//! [`LocalRateLimitStore`] is the in-process fallback used when no redis
//! settings have been pushed.
use std::{num::NonZeroU32, sync::Arc, time::{SystemTime, UNIX_EPOCH}};

use async_trait::async_trait;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::{InMemoryState, NotKeyed}};
use scc::HashMap;

use crate::{
    plugins::rate_limiter::handler::RedisSettings,
    ports::rate_limit::{RateLimitDecision, RateLimitStore, RateLimitStoreError},
    utils::singleton::SingletonRegistry,
};

/// Spring-style token bucket: refill by elapsed seconds, cap at capacity,
/// take one token if available. Returns `{allowed, tokens_left}`.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local tokens_key = KEYS[1]
local timestamp_key = KEYS[2]
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local requested = tonumber(ARGV[4])

local fill_time = capacity / rate
local ttl = math.floor(fill_time * 2)
if ttl < 1 then ttl = 1 end

local last_tokens = tonumber(redis.call("get", tokens_key))
if last_tokens == nil then last_tokens = capacity end
local last_refreshed = tonumber(redis.call("get", timestamp_key))
if last_refreshed == nil then last_refreshed = now end

local delta = math.max(0, now - last_refreshed)
local filled = math.min(capacity, last_tokens + (delta * rate))
local allowed = 0
local new_tokens = filled
if filled >= requested then
  allowed = 1
  new_tokens = filled - requested
end

redis.call("setex", tokens_key, ttl, new_tokens)
redis.call("setex", timestamp_key, ttl, now)
return { allowed, new_tokens }
"#;

pub struct RedisRateLimitStore {
    manager: redis::aio::ConnectionManager,
    script: redis::Script,
}

impl RedisRateLimitStore {
    /// Connect to the pushed redis deployment. Cluster and sentinel node
    /// lists are tried in order until one connects.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, RateLimitStoreError> {
        let urls = settings.connection_urls();
        let mut last_err = None;
        for url in &urls {
            let client = match redis::Client::open(url.as_str()) {
                Ok(client) => client,
                Err(err) => {
                    last_err = Some(err.to_string());
                    continue;
                }
            };
            match redis::aio::ConnectionManager::new(client).await {
                Ok(manager) => {
                    tracing::info!(nodes = urls.len(), "connected rate limiter redis backend");
                    return Ok(Self {
                        manager,
                        script: redis::Script::new(TOKEN_BUCKET_SCRIPT),
                    });
                }
                Err(err) => last_err = Some(err.to_string()),
            }
        }
        Err(RateLimitStoreError::Unavailable(
            last_err.unwrap_or_else(|| "no redis nodes configured".to_string()),
        ))
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn try_acquire(
        &self,
        key: &str,
        replenish_rate: u32,
        burst_capacity: u32,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut conn = self.manager.clone();
        let (allowed, tokens_remaining): (i64, i64) = self
            .script
            .key(format!("rate_limiter.{{{key}}}.tokens"))
            .key(format!("rate_limiter.{{{key}}}.timestamp"))
            .arg(replenish_rate)
            .arg(burst_capacity)
            .arg(now)
            .arg(1)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| RateLimitStoreError::Unavailable(err.to_string()))?;
        Ok(RateLimitDecision {
            allowed: allowed == 1,
            tokens_remaining,
        })
    }
}

type LocalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct LocalBucket {
    replenish_rate: u32,
    burst_capacity: u32,
    limiter: LocalLimiter,
}

/// Per-process limiter keyed by rule id. Buckets are rebuilt when a rule's
/// parameters change.
#[derive(Default)]
pub struct LocalRateLimitStore {
    buckets: HashMap<String, Arc<LocalBucket>>,
}

impl LocalRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, key: &str, replenish_rate: u32, burst_capacity: u32) -> Arc<LocalBucket> {
        if let Some(existing) = self
            .buckets
            .read_sync(key, |_, bucket| bucket.clone())
            .filter(|b| b.replenish_rate == replenish_rate && b.burst_capacity == burst_capacity)
        {
            return existing;
        }
        let rate = NonZeroU32::new(replenish_rate.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst_capacity.max(1)).unwrap_or(NonZeroU32::MIN);
        let fresh = Arc::new(LocalBucket {
            replenish_rate,
            burst_capacity,
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
        });
        self.buckets
            .entry_sync(key.to_string())
            .and_modify(|bucket| *bucket = fresh.clone())
            .or_insert_with(|| fresh.clone());
        fresh
    }
}

#[async_trait]
impl RateLimitStore for LocalRateLimitStore {
    async fn try_acquire(
        &self,
        key: &str,
        replenish_rate: u32,
        burst_capacity: u32,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        let bucket = self.bucket(key, replenish_rate, burst_capacity);
        let allowed = bucket.limiter.check().is_ok();
        Ok(RateLimitDecision {
            allowed,
            tokens_remaining: if allowed { 0 } else { -1 },
        })
    }
}

/// Store that follows the pushed rate limiter settings at runtime.
///
/// While no redis settings are in the registry it limits in-process; once
/// settings arrive (or change) it connects the redis backend lazily on the
/// next probe. Connection failures fall back to the local store for that
/// probe and are retried on the following one.
pub struct RegistryRateLimitStore {
    registry: Arc<SingletonRegistry>,
    local: LocalRateLimitStore,
    remote: tokio::sync::Mutex<Option<(Arc<RedisSettings>, Arc<RedisRateLimitStore>)>>,
}

impl RegistryRateLimitStore {
    pub fn new(registry: Arc<SingletonRegistry>) -> Self {
        Self {
            registry,
            local: LocalRateLimitStore::new(),
            remote: tokio::sync::Mutex::new(None),
        }
    }

    async fn remote_for(
        &self,
        settings: Arc<RedisSettings>,
    ) -> Result<Arc<RedisRateLimitStore>, RateLimitStoreError> {
        let mut remote = self.remote.lock().await;
        if let Some((current, store)) = remote.as_ref()
            && Arc::ptr_eq(current, &settings)
        {
            return Ok(store.clone());
        }
        let store = Arc::new(RedisRateLimitStore::connect(&settings).await?);
        *remote = Some((settings, store.clone()));
        Ok(store)
    }
}

#[async_trait]
impl RateLimitStore for RegistryRateLimitStore {
    async fn try_acquire(
        &self,
        key: &str,
        replenish_rate: u32,
        burst_capacity: u32,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        let Some(settings) = self.registry.get::<RedisSettings>() else {
            return self.local.try_acquire(key, replenish_rate, burst_capacity).await;
        };
        match self.remote_for(settings).await {
            Ok(store) => store.try_acquire(key, replenish_rate, burst_capacity).await,
            Err(err) => {
                tracing::warn!(%err, "redis limiter unavailable, limiting in-process");
                self.local.try_acquire(key, replenish_rate, burst_capacity).await
            }
        }
    }
}
