//! Outbound HTTP adapter backed by `reqwest`.
//!
//! One attempt per call; timeout and retry policy live in the web client
//! stage. The adapter echoes method, headers and body onto the rewritten
//! target url and converts the backend response into the exchange's response
//! shape.
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode, header};

use crate::{
    core::context::{GatewayResponse, RequestInfo},
    ports::http_client::{HttpClient, HttpClientError, HttpClientResult},
};

const USER_AGENT: &str = concat!("Synapse-Gateway/", env!("CARGO_PKG_VERSION"));

pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> HttpClientResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| HttpClientError::InvalidRequest(err.to_string()))?;
        Ok(Self { client })
    }

    /// Hop-by-hop headers must not be forwarded.
    fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        for (name, value) in headers {
            match *name {
                header::HOST
                | header::CONNECTION
                | header::TRANSFER_ENCODING
                | header::UPGRADE
                | header::CONTENT_LENGTH => {}
                _ => {
                    out.append(name.clone(), value.clone());
                }
            }
        }
        out
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn forward(&self, request: &RequestInfo, url: &str) -> HttpClientResult<GatewayResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(Self::forwardable_headers(&request.headers));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_builder() || err.is_request() {
                HttpClientError::InvalidRequest(err.to_string())
            } else {
                HttpClientError::Connection(err.to_string())
            }
        })?;

        let status =
            StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            if *name != header::TRANSFER_ENCODING {
                headers.append(name.clone(), value.clone());
            }
        }
        let body: Bytes = response
            .bytes()
            .await
            .map_err(|err| HttpClientError::Body(err.to_string()))?;

        Ok(GatewayResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn hop_by_hop_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert("x-tenant", HeaderValue::from_static("t-7"));

        let out = ReqwestHttpClient::forwardable_headers(&headers);
        assert!(out.get(header::HOST).is_none());
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(out.get("x-tenant").unwrap(), "t-7");
    }
}
