//! Terminal HTTP invocation stage.
//!
//! Consumes the target url the divide stage resolved, forwards the request
//! through the [`HttpClient`] port and writes the backend's response on the
//! exchange. Honors the per-rule timeout and retry budget left in the
//! attribute bag.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::timeout;

use crate::{
    core::{
        chain::{GatewayPlugin, Next},
        context::{Exchange, attr, rpc_type},
        result::GatewayError,
    },
    plugins::{names, orders},
    ports::http_client::HttpClient,
};

const DEFAULT_TIMEOUT_MS: u64 = 3000;

pub struct WebClientPlugin {
    client: Arc<dyn HttpClient>,
}

impl WebClientPlugin {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GatewayPlugin for WebClientPlugin {
    fn named(&self) -> &'static str {
        names::WEB_CLIENT
    }

    fn order(&self) -> i32 {
        orders::WEB_CLIENT
    }

    fn skip(&self, exchange: &Exchange) -> bool {
        exchange.rpc_type() != rpc_type::HTTP
    }

    async fn execute(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<(), GatewayError> {
        let url = exchange
            .context()
            .map(|ctx| ctx.real_url.clone())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GatewayError::RealUrlNotFound {
                path: exchange.request.path.clone(),
            })?;

        let timeout_ms = exchange
            .attribute::<u64>(attr::HTTP_TIMEOUT)
            .copied()
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let retries = exchange
            .attribute::<u32>(attr::HTTP_RETRY)
            .copied()
            .unwrap_or(0);
        let deadline = Duration::from_millis(timeout_ms);

        let mut last_err = None;
        for attempt in 0..=retries {
            match timeout(deadline, self.client.forward(&exchange.request, &url)).await {
                Ok(Ok(response)) => {
                    tracing::debug!(%url, attempt, status = %response.status, "backend responded");
                    exchange.set_response(response);
                    return next.run(exchange).await;
                }
                Ok(Err(err)) => {
                    tracing::warn!(%url, attempt, %err, "backend invocation failed");
                    last_err = Some(GatewayError::UpstreamInvocationFailed(err.to_string()));
                }
                Err(_) => {
                    tracing::warn!(%url, attempt, timeout_ms, "backend call timed out");
                    return Err(GatewayError::ServiceTimeout { timeout_ms });
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            GatewayError::UpstreamInvocationFailed("no attempt was made".to_string())
        }))
    }
}
