//! Per-request exchange state shared by every chain stage.
//!
//! An [`Exchange`] wraps the immutable request view, a typed attribute bag
//! for cross-plugin decisions, and the terminal response slot. It lives for
//! exactly one request and is never shared across requests.
use std::{any::Any, collections::HashMap, net::IpAddr};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, StatusCode, header};
use serde::Serialize;

use crate::core::result::{GatewayResult, ResultCode};

/// RPC type tokens used in contexts, metadata and rule handles.
pub mod rpc_type {
    pub const HTTP: &str = "http";
    pub const DUBBO: &str = "dubbo";
}

/// Well-known attribute keys.
pub mod attr {
    /// The resolved [`super::GatewayContext`].
    pub const CONTEXT: &str = "context";
    /// The matched `MetaData` for RPC routes.
    pub const META_DATA: &str = "metaData";
    /// Millisecond timeout the terminal HTTP stage must honor.
    pub const HTTP_TIMEOUT: &str = "httpTimeout";
    /// Retry budget for the terminal HTTP stage.
    pub const HTTP_RETRY: &str = "httpRetry";
    /// Raw RPC result stashed by bridging plugins.
    pub const RPC_RESULT: &str = "rpcResult";
}

/// Immutable view of the inbound request, derived once at the boundary.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub path: String,
    pub host: String,
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub remote_ip: Option<IpAddr>,
    pub body: Option<String>,
}

impl RequestInfo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Stable key for hash-based upstream selection: client ip, falling back
    /// to the request path.
    pub fn hash_key(&self) -> String {
        self.remote_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| self.path.clone())
    }
}

/// Cross-plugin request-scoped decisions (the resolved rpc type, the chosen
/// upstream url, timing). Created by the global plugin at chain entry.
#[derive(Debug, Clone)]
pub struct GatewayContext {
    pub rpc_type: String,
    pub module: String,
    pub method: String,
    pub real_url: String,
    pub start_time: DateTime<Utc>,
}

impl GatewayContext {
    pub fn new(rpc_type: impl Into<String>, path: &str) -> Self {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let module = segments.next().unwrap_or_default().to_string();
        Self {
            rpc_type: rpc_type.into(),
            module,
            method: path.to_string(),
            real_url: String::new(),
            start_time: Utc::now(),
        }
    }
}

/// Terminal response produced by a plugin.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn new(status: StatusCode, body: Bytes) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// JSON body with the shared `{code, message, data}` envelope.
    pub fn json<T: Serialize>(status: StatusCode, result: &GatewayResult<T>) -> Self {
        let body = serde_json::to_vec(result).unwrap_or_default();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(body),
        }
    }

    /// Structured failure body for a stable result code.
    pub fn from_result_code(code: ResultCode) -> Self {
        let status = StatusCode::from_u16(code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::json(status, &GatewayResult::<()>::error(code))
    }

    pub fn success<T: Serialize>(data: T) -> Self {
        Self::json(StatusCode::OK, &GatewayResult::success(data))
    }
}

/// The mutable unit of work passed down the plugin chain.
pub struct Exchange {
    pub request: RequestInfo,
    attributes: HashMap<String, Box<dyn Any + Send + Sync>>,
    response: Option<GatewayResponse>,
}

impl Exchange {
    pub fn new(request: RequestInfo) -> Self {
        Self {
            request,
            attributes: HashMap::new(),
            response: None,
        }
    }

    pub fn set_attribute<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.attributes.insert(key.to_string(), Box::new(value));
    }

    pub fn attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn attribute_mut<T: Any + Send + Sync>(&mut self, key: &str) -> Option<&mut T> {
        self.attributes.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// The resolved gateway context. Present after the global plugin ran.
    pub fn context(&self) -> Option<&GatewayContext> {
        self.attribute(attr::CONTEXT)
    }

    pub fn context_mut(&mut self) -> Option<&mut GatewayContext> {
        self.attribute_mut(attr::CONTEXT)
    }

    /// The rpc type of this request, defaulting to plain HTTP before the
    /// context is established.
    pub fn rpc_type(&self) -> &str {
        self.context()
            .map(|ctx| ctx.rpc_type.as_str())
            .unwrap_or(rpc_type::HTTP)
    }

    pub fn set_response(&mut self, response: GatewayResponse) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&GatewayResponse> {
        self.response.as_ref()
    }

    pub fn take_response(&mut self) -> Option<GatewayResponse> {
        self.response.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn request(path: &str) -> RequestInfo {
        RequestInfo {
            method: Method::GET,
            path: path.to_string(),
            host: "localhost".to_string(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            remote_ip: None,
            body: None,
        }
    }

    #[test]
    fn attributes_are_typed() {
        let mut exchange = Exchange::new(request("/http/order"));
        exchange.set_attribute(attr::HTTP_TIMEOUT, 3000_u64);
        assert_eq!(exchange.attribute::<u64>(attr::HTTP_TIMEOUT), Some(&3000));
        assert!(exchange.attribute::<String>(attr::HTTP_TIMEOUT).is_none());
    }

    #[test]
    fn context_module_derives_from_first_segment() {
        let ctx = GatewayContext::new(rpc_type::DUBBO, "/dubbo/findAll");
        assert_eq!(ctx.module, "dubbo");
        assert_eq!(ctx.method, "/dubbo/findAll");
        assert!(ctx.real_url.is_empty());
    }

    #[test]
    fn rpc_type_defaults_to_http() {
        let exchange = Exchange::new(request("/http/order"));
        assert_eq!(exchange.rpc_type(), rpc_type::HTTP);
    }
}
