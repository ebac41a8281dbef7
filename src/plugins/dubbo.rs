//! Dubbo RPC bridging stage.
//!
//! Applies only to requests the global plugin resolved as dubbo traffic.
//! The invocation itself goes through the [`RpcInvoker`] port; this stage
//! enforces the metadata and body preconditions and wraps the result in the
//! shared response envelope.
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::models::{MetaData, RuleData, SelectorData},
    core::{
        chain::{MatchablePlugin, Next},
        context::{Exchange, GatewayResponse, attr, rpc_type},
        result::GatewayError,
    },
    plugins::{names, orders},
    ports::rpc::RpcInvoker,
};

pub struct DubboPlugin {
    invoker: Arc<dyn RpcInvoker>,
}

impl DubboPlugin {
    pub fn new(invoker: Arc<dyn RpcInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl MatchablePlugin for DubboPlugin {
    fn named(&self) -> &'static str {
        names::DUBBO
    }

    fn order(&self) -> i32 {
        orders::DUBBO
    }

    fn skip(&self, exchange: &Exchange) -> bool {
        exchange.rpc_type() != rpc_type::DUBBO
    }

    async fn do_execute(
        &self,
        exchange: &mut Exchange,
        next: Next<'_>,
        _selector: &SelectorData,
        _rule: &RuleData,
    ) -> Result<(), GatewayError> {
        let meta = exchange
            .attribute::<MetaData>(attr::META_DATA)
            .cloned()
            .filter(|meta| !meta.service_name.is_empty() && !meta.method_name.is_empty())
            .ok_or_else(|| GatewayError::MetaDataError {
                path: exchange.request.path.clone(),
            })?;

        let body = exchange.request.body.clone();
        if !meta.parameter_types.is_empty() && body.as_deref().is_none_or(str::is_empty) {
            return Err(GatewayError::RpcBodyRequired {
                service: meta.service_name.clone(),
            });
        }

        let result = self
            .invoker
            .invoke(&meta, body.as_deref())
            .await
            .map_err(|err| GatewayError::UpstreamInvocationFailed(err.to_string()))?;

        exchange.set_attribute(attr::RPC_RESULT, result.clone());
        exchange.set_response(GatewayResponse::success(result));
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
    use serde_json::json;

    use super::*;
    use crate::{
        core::context::{GatewayContext, RequestInfo},
        ports::rpc::RpcError,
    };

    struct StubInvoker {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RpcInvoker for StubInvoker {
        async fn invoke(
            &self,
            meta: &MetaData,
            _body: Option<&str>,
        ) -> Result<serde_json::Value, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RpcError::Invocation("backend down".to_string()));
            }
            Ok(json!({"service": meta.service_name}))
        }
    }

    fn dubbo_exchange(meta: Option<MetaData>, body: Option<&str>) -> Exchange {
        let path = "/dubbo/findAll";
        let mut exchange = Exchange::new(RequestInfo {
            method: Method::POST,
            path: path.to_string(),
            host: "localhost".to_string(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            remote_ip: None,
            body: body.map(str::to_string),
        });
        exchange.set_attribute(attr::CONTEXT, GatewayContext::new(rpc_type::DUBBO, path));
        if let Some(meta) = meta {
            exchange.set_attribute(attr::META_DATA, meta);
        }
        exchange
    }

    fn meta(parameter_types: &str) -> MetaData {
        MetaData {
            path: "/dubbo/findAll".to_string(),
            rpc_type: rpc_type::DUBBO.to_string(),
            service_name: "org.acme.UserService".to_string(),
            method_name: "findAll".to_string(),
            parameter_types: parameter_types.to_string(),
            enabled: true,
            ..Default::default()
        }
    }

    fn selector_and_rule() -> (SelectorData, RuleData) {
        let selector = SelectorData {
            id: "s1".to_string(),
            plugin_id: String::new(),
            plugin_name: names::DUBBO.to_string(),
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
            plugin_name: names::DUBBO.to_string(),
            name: "r1".to_string(),
            match_mode: Default::default(),
            sort: 1,
            enabled: true,
            handle: String::new(),
            conditions: vec![],
        };
        (selector, rule)
    }

    #[tokio::test]
    async fn invokes_and_wraps_the_result() {
        let invoker = Arc::new(StubInvoker {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let plugin = DubboPlugin::new(invoker.clone());
        let (selector, rule) = selector_and_rule();

        let mut exchange = dubbo_exchange(Some(meta("")), None);
        plugin
            .do_execute(&mut exchange, Next::new(&[]), &selector, &rule)
            .await
            .unwrap();

        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
        let response = exchange.response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["service"], "org.acme.UserService");
    }

    #[tokio::test]
    async fn missing_metadata_is_a_metadata_error() {
        let plugin = DubboPlugin::new(Arc::new(StubInvoker {
            calls: AtomicUsize::new(0),
            fail: false,
        }));
        let (selector, rule) = selector_and_rule();

        let mut exchange = dubbo_exchange(None, None);
        let err = plugin
            .do_execute(&mut exchange, Next::new(&[]), &selector, &rule)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MetaDataError { .. }));
    }

    #[tokio::test]
    async fn parameterized_method_requires_a_body() {
        let invoker = Arc::new(StubInvoker {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let plugin = DubboPlugin::new(invoker.clone());
        let (selector, rule) = selector_and_rule();

        let mut exchange = dubbo_exchange(Some(meta("java.lang.Long")), None);
        let err = plugin
            .do_execute(&mut exchange, Next::new(&[]), &selector, &rule)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RpcBodyRequired { .. }));
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invocation_failure_maps_to_service_result_error() {
        let plugin = DubboPlugin::new(Arc::new(StubInvoker {
            calls: AtomicUsize::new(0),
            fail: true,
        }));
        let (selector, rule) = selector_and_rule();

        let mut exchange = dubbo_exchange(Some(meta("")), None);
        let err = plugin
            .do_execute(&mut exchange, Next::new(&[]), &selector, &rule)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamInvocationFailed(_)));
    }

    #[tokio::test]
    async fn skips_http_traffic() {
        let plugin = DubboPlugin::new(Arc::new(StubInvoker {
            calls: AtomicUsize::new(0),
            fail: false,
        }));
        let mut exchange = dubbo_exchange(None, None);
        exchange.set_attribute(
            attr::CONTEXT,
            GatewayContext::new(rpc_type::HTTP, "/http/order"),
        );
        assert!(plugin.skip(&exchange));
    }
}
