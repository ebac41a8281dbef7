//! Inbound HTTP surface.
//!
//! Every request, whatever its path, funnels through the gateway chain; the
//! router has no static routes of its own. Bodies are buffered up front
//! because condition matching and the RPC bridge both need them as strings.
use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Request, State},
    response::Response,
    routing::any,
};
use http::StatusCode;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::{
    context::{GatewayResponse, RequestInfo},
    gateway::Gateway,
};

/// Largest request body the gateway buffers.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub struct HttpHandler {
    gateway: Arc<Gateway>,
}

impl HttpHandler {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Router forwarding every path into the chain.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", any(handle_request))
            .route("/{*path}", any(handle_request))
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    async fn dispatch(&self, req: Request, remote: Option<SocketAddr>) -> GatewayResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "request",
            %request_id,
            http.method = %req.method(),
            http.path = req.uri().path(),
        );
        let _enter = span.enter();

        let info = match into_request_info(req, remote).await {
            Ok(info) => info,
            Err(status) => {
                return GatewayResponse::new(status, Default::default());
            }
        };
        self.gateway.handle(info).await
    }
}

async fn handle_request(
    State(handler): State<Arc<HttpHandler>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let gateway_response = handler.dispatch(req, Some(remote)).await;
    into_axum_response(gateway_response)
}

async fn into_request_info(
    req: Request,
    remote: Option<SocketAddr>,
) -> Result<RequestInfo, StatusCode> {
    let (parts, body) = req.into_parts();

    let host = parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;
    let body = if bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&bytes).into_owned())
    };

    Ok(RequestInfo {
        method: parts.method,
        path: parts.uri.path().to_string(),
        host,
        headers: parts.headers,
        query,
        remote_ip: remote.map(|addr| addr.ip()),
        body,
    })
}

fn into_axum_response(response: GatewayResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    if let Some(headers) = builder.headers_mut() {
        headers.extend(response.headers);
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
