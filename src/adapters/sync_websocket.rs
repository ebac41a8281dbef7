//! Websocket client for the control-plane push channel.
//!
//! Maintains one long-lived connection, feeding every text frame into the
//! sync dispatcher. On disconnect it retries forever at a fixed interval;
//! the caches simply keep serving the last pushed state while the link is
//! down.
use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::sync::handler::SyncDispatcher;

pub struct SyncClient {
    url: Url,
    dispatcher: Arc<SyncDispatcher>,
    retry_interval: Duration,
}

impl SyncClient {
    pub fn new(url: Url, dispatcher: Arc<SyncDispatcher>, retry_interval: Duration) -> Self {
        Self {
            url,
            dispatcher,
            retry_interval,
        }
    }

    /// Run the connect / consume / retry loop until the task is dropped.
    pub async fn run(&self) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => {
                    tracing::info!(url = %self.url, "config sync channel connected");
                    self.consume(stream).await;
                    tracing::warn!(url = %self.url, "config sync channel closed");
                }
                Err(err) => {
                    tracing::warn!(url = %self.url, %err, "config sync connect failed");
                }
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    async fn consume(
        &self,
        stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) {
        let (mut write, mut read) = stream.split();
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Err(err) = self.dispatcher.dispatch_message(text.as_str()) {
                        tracing::warn!(%err, "dropping undispatchable sync frame");
                    }
                }
                Ok(Message::Ping(payload)) => {
                    if write.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%err, "sync channel read error");
                    break;
                }
            }
        }
    }
}
