//! Token-bucket rate limiting stage.
//!
//! The bucket is keyed by the matched rule id, so every rule carries its own
//! limiter state. A rejected probe terminates the chain with the structured
//! 429 body; a store outage is logged and treated as allow.
pub mod handler;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::models::{RateLimiterHandle, RuleData, SelectorData},
    core::{
        chain::{MatchablePlugin, Next},
        context::{Exchange, GatewayResponse},
        result::{GatewayError, ResultCode},
    },
    plugins::{names, orders},
    ports::rate_limit::RateLimitStore,
};

pub use handler::RateLimiterConfigHandler;

pub struct RateLimiterPlugin {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiterPlugin {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    fn parse_handle(rule: &RuleData) -> RateLimiterHandle {
        if rule.handle.trim().is_empty() {
            return RateLimiterHandle::default();
        }
        serde_json::from_str(&rule.handle).unwrap_or_else(|err| {
            tracing::warn!(rule = %rule.id, %err, "bad limiter handle, using defaults");
            RateLimiterHandle::default()
        })
    }
}

#[async_trait]
impl MatchablePlugin for RateLimiterPlugin {
    fn named(&self) -> &'static str {
        names::RATE_LIMITER
    }

    fn order(&self) -> i32 {
        orders::RATE_LIMITER
    }

    async fn do_execute(
        &self,
        exchange: &mut Exchange,
        next: Next<'_>,
        _selector: &SelectorData,
        rule: &RuleData,
    ) -> Result<(), GatewayError> {
        let handle = Self::parse_handle(rule);
        let decision = match self
            .store
            .try_acquire(&rule.id, handle.replenish_rate, handle.burst_capacity)
            .await
        {
            Ok(decision) => decision,
            Err(err) => {
                // Fail open: a limiter outage must not take traffic down.
                tracing::warn!(rule = %rule.id, %err, "limiter store unavailable, allowing");
                return next.run(exchange).await;
            }
        };

        if !decision.allowed {
            tracing::debug!(rule = %rule.id, "request rate limited");
            exchange.set_response(GatewayResponse::from_result_code(ResultCode::TooManyRequests));
            return Ok(());
        }
        next.run(exchange).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use http::{HeaderMap, Method, StatusCode};

    use super::*;
    use crate::{
        core::context::RequestInfo,
        ports::rate_limit::{RateLimitDecision, RateLimitStoreError},
    };

    struct StubStore {
        allowed: bool,
        fail: bool,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl RateLimitStore for StubStore {
        async fn try_acquire(
            &self,
            _key: &str,
            _replenish_rate: u32,
            _burst_capacity: u32,
        ) -> Result<RateLimitDecision, RateLimitStoreError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RateLimitStoreError::Unavailable("down".to_string()));
            }
            Ok(RateLimitDecision {
                allowed: self.allowed,
                tokens_remaining: if self.allowed { 1 } else { -1 },
            })
        }
    }

    fn exchange() -> Exchange {
        Exchange::new(RequestInfo {
            method: Method::GET,
            path: "/http/order".to_string(),
            host: "localhost".to_string(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            remote_ip: None,
            body: None,
        })
    }

    fn selector_and_rule(handle: &str) -> (SelectorData, RuleData) {
        let selector = SelectorData {
            id: "s1".to_string(),
            plugin_id: String::new(),
            plugin_name: names::RATE_LIMITER.to_string(),
            name: "s1".to_string(),
            match_mode: Default::default(),
            selector_type: Default::default(),
            sort: 1,
            enabled: true,
            handle: String::new(),
            conditions: vec![],
        };
        let rule = RuleData {
            id: "r1".to_string(),
            selector_id: "s1".to_string(),
            plugin_name: names::RATE_LIMITER.to_string(),
            name: "r1".to_string(),
            match_mode: Default::default(),
            sort: 1,
            enabled: true,
            handle: handle.to_string(),
            conditions: vec![],
        };
        (selector, rule)
    }

    #[tokio::test]
    async fn allowed_requests_continue_down_the_chain() {
        let store = Arc::new(StubStore {
            allowed: true,
            fail: false,
            seen: AtomicUsize::new(0),
        });
        let plugin = RateLimiterPlugin::new(store.clone());
        let (selector, rule) = selector_and_rule(r#"{"replenishRate":10,"burstCapacity":20}"#);

        let mut exchange = exchange();
        plugin
            .do_execute(&mut exchange, Next::new(&[]), &selector, &rule)
            .await
            .unwrap();
        assert!(exchange.response().is_none());
        assert_eq!(store.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_requests_get_a_429_body() {
        let plugin = RateLimiterPlugin::new(Arc::new(StubStore {
            allowed: false,
            fail: false,
            seen: AtomicUsize::new(0),
        }));
        let (selector, rule) = selector_and_rule("");

        let mut exchange = exchange();
        plugin
            .do_execute(&mut exchange, Next::new(&[]), &selector, &rule)
            .await
            .unwrap();

        let response = exchange.response().unwrap();
        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["code"], 429);
    }

    #[tokio::test]
    async fn store_outage_fails_open() {
        let plugin = RateLimiterPlugin::new(Arc::new(StubStore {
            allowed: false,
            fail: true,
            seen: AtomicUsize::new(0),
        }));
        let (selector, rule) = selector_and_rule("");

        let mut exchange = exchange();
        plugin
            .do_execute(&mut exchange, Next::new(&[]), &selector, &rule)
            .await
            .unwrap();
        assert!(exchange.response().is_none());
    }
}
