//! Generic-invocation RPC bridge over HTTP.
//!
//! RPC frameworks with an HTTP generic-invoke endpoint (a dubbo generic
//! gateway, a JSON-RPC shim) can be driven without protocol-specific codecs:
//! the endpoint url comes from the route metadata's `rpc_ext` and receives a
//! JSON envelope naming service, method and parameters.
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::models::MetaData,
    ports::rpc::{RpcError, RpcInvoker},
};

#[derive(Debug, Deserialize)]
struct RpcExt {
    /// Generic-invoke endpoint for this service.
    endpoint: String,
}

pub struct HttpBridgeRpcInvoker {
    client: reqwest::Client,
}

impl HttpBridgeRpcInvoker {
    pub fn new() -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| RpcError::Invocation(err.to_string()))?;
        Ok(Self { client })
    }

    fn endpoint(meta: &MetaData) -> Result<String, RpcError> {
        if meta.rpc_ext.trim().is_empty() {
            return Err(RpcError::UnknownService(format!(
                "{} has no rpc endpoint configured",
                meta.service_name
            )));
        }
        let ext: RpcExt = serde_json::from_str(&meta.rpc_ext)
            .map_err(|err| RpcError::Invocation(format!("bad rpc_ext: {err}")))?;
        Ok(ext.endpoint)
    }

    fn envelope(meta: &MetaData, body: Option<&str>) -> Result<serde_json::Value, RpcError> {
        let parameters = match body {
            None => serde_json::Value::Null,
            Some(raw) => serde_json::from_str(raw)
                .map_err(|err| RpcError::ParameterMismatch(err.to_string()))?,
        };
        Ok(json!({
            "service": meta.service_name,
            "method": meta.method_name,
            "parameterTypes": meta.parameter_types,
            "parameters": parameters,
        }))
    }
}

#[async_trait]
impl RpcInvoker for HttpBridgeRpcInvoker {
    async fn invoke(
        &self,
        meta: &MetaData,
        body: Option<&str>,
    ) -> Result<serde_json::Value, RpcError> {
        let endpoint = Self::endpoint(meta)?;
        let envelope = Self::envelope(meta, body)?;

        let response = self
            .client
            .post(&endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| RpcError::Invocation(err.to_string()))?;
        if !response.status().is_success() {
            return Err(RpcError::Invocation(format!(
                "{} returned {}",
                endpoint,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|err| RpcError::Invocation(err.to_string()))
    }
}
