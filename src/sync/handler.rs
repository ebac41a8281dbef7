//! Entity handlers bridging raw push payloads to typed subscribers.
//!
//! Each config group owns one [`EntityHandler`]; the [`SyncDispatcher`]
//! routes an incoming [`PushMessage`] to the right handler by group tag. A
//! subscriber error is logged and isolated so the rest of the batch (and the
//! other subscribers) still see every entity.
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{
    config::models::{MetaData, PluginData, RuleData, SelectorData},
    core::result::GatewayError,
    sync::{subscriber::DataSubscriber, ConfigGroup, DataEvent, PushMessage},
};

/// Converts raw payloads of one entity kind and fans events out to its
/// subscribers in registration order.
pub struct EntityHandler<T> {
    kind: &'static str,
    subscribers: Vec<Arc<dyn DataSubscriber<T>>>,
}

impl<T: DeserializeOwned> EntityHandler<T> {
    pub fn new(kind: &'static str, subscribers: Vec<Arc<dyn DataSubscriber<T>>>) -> Self {
        Self { kind, subscribers }
    }

    /// Deserialize a pushed batch. A payload that does not parse as a list
    /// of this handler's entity type is rejected whole.
    pub fn convert(&self, payload: serde_json::Value) -> Result<Vec<T>, GatewayError> {
        serde_json::from_value(payload)
            .map_err(|err| GatewayError::MalformedConfig(format!("{} batch: {err}", self.kind)))
    }

    pub fn handle(&self, payload: serde_json::Value, event: DataEvent) -> Result<(), GatewayError> {
        let entities = self.convert(payload)?;
        match event {
            DataEvent::Refresh => self.do_refresh(&entities),
            DataEvent::Create | DataEvent::Update => self.do_update(&entities),
            DataEvent::Delete => self.do_delete(&entities),
        }
        Ok(())
    }

    /// Reset every subscriber, then replay the full batch in input order.
    fn do_refresh(&self, entities: &[T]) {
        for subscriber in &self.subscribers {
            if let Err(error) = subscriber.refresh(entities) {
                warn!(kind = self.kind, %error, "subscriber refresh failed");
            }
            for entity in entities {
                if let Err(error) = subscriber.on_subscribe(entity) {
                    warn!(kind = self.kind, %error, "subscriber rejected entity");
                }
            }
        }
    }

    fn do_update(&self, entities: &[T]) {
        for subscriber in &self.subscribers {
            for entity in entities {
                if let Err(error) = subscriber.on_subscribe(entity) {
                    warn!(kind = self.kind, %error, "subscriber rejected entity");
                }
            }
        }
    }

    fn do_delete(&self, entities: &[T]) {
        for subscriber in &self.subscribers {
            for entity in entities {
                if let Err(error) = subscriber.un_subscribe(entity) {
                    warn!(kind = self.kind, %error, "subscriber rejected removal");
                }
            }
        }
    }
}

/// Routes push messages to the per-kind handlers.
pub struct SyncDispatcher {
    plugins: EntityHandler<PluginData>,
    selectors: EntityHandler<SelectorData>,
    rules: EntityHandler<RuleData>,
    metadata: EntityHandler<MetaData>,
}

impl SyncDispatcher {
    pub fn new(
        plugins: EntityHandler<PluginData>,
        selectors: EntityHandler<SelectorData>,
        rules: EntityHandler<RuleData>,
        metadata: EntityHandler<MetaData>,
    ) -> Self {
        Self {
            plugins,
            selectors,
            rules,
            metadata,
        }
    }

    pub fn dispatch(
        &self,
        group: ConfigGroup,
        event: DataEvent,
        payload: serde_json::Value,
    ) -> Result<(), GatewayError> {
        match group {
            ConfigGroup::Plugin => self.plugins.handle(payload, event),
            ConfigGroup::Selector => self.selectors.handle(payload, event),
            ConfigGroup::Rule => self.rules.handle(payload, event),
            ConfigGroup::MetaData => self.metadata.handle(payload, event),
        }
    }

    /// Parse one raw transport frame and dispatch it.
    pub fn dispatch_message(&self, raw: &str) -> Result<(), GatewayError> {
        let message: PushMessage = serde_json::from_str(raw)
            .map_err(|err| GatewayError::MalformedConfig(format!("push message: {err}")))?;
        self.dispatch(message.group_type, message.event_type, message.data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingSubscriber {
        events: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl DataSubscriber<MetaData> for RecordingSubscriber {
        fn on_subscribe(&self, meta: &MetaData) -> Result<(), GatewayError> {
            if self.fail_on.as_deref() == Some(meta.path.as_str()) {
                return Err(GatewayError::Internal("boom".to_string()));
            }
            self.events.lock().unwrap().push(format!("sub:{}", meta.path));
            Ok(())
        }

        fn un_subscribe(&self, meta: &MetaData) -> Result<(), GatewayError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("unsub:{}", meta.path));
            Ok(())
        }

        fn refresh(&self, _entities: &[MetaData]) -> Result<(), GatewayError> {
            self.events.lock().unwrap().push("refresh".to_string());
            Ok(())
        }
    }

    fn batch(paths: &[&str]) -> serde_json::Value {
        json!(paths.iter().map(|p| json!({"path": p})).collect::<Vec<_>>())
    }

    #[test]
    fn refresh_resets_then_replays_in_order() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let handler = EntityHandler::new("metadata", vec![subscriber.clone() as Arc<dyn DataSubscriber<MetaData>>]);

        handler
            .handle(batch(&["/a", "/b"]), DataEvent::Refresh)
            .unwrap();
        handler.handle(batch(&["/a"]), DataEvent::Refresh).unwrap();

        assert_eq!(
            *subscriber.events.lock().unwrap(),
            vec!["refresh", "sub:/a", "sub:/b", "refresh", "sub:/a"]
        );
    }

    #[test]
    fn update_then_delete_sequence() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let handler = EntityHandler::new("metadata", vec![subscriber.clone() as Arc<dyn DataSubscriber<MetaData>>]);

        handler
            .handle(batch(&["/e1", "/e2"]), DataEvent::Update)
            .unwrap();
        handler.handle(batch(&["/e1"]), DataEvent::Delete).unwrap();

        assert_eq!(
            *subscriber.events.lock().unwrap(),
            vec!["sub:/e1", "sub:/e2", "unsub:/e1"]
        );
    }

    #[test]
    fn a_failing_entity_does_not_stop_the_batch() {
        let subscriber = Arc::new(RecordingSubscriber {
            events: Mutex::new(Vec::new()),
            fail_on: Some("/bad".to_string()),
        });
        let handler = EntityHandler::new("metadata", vec![subscriber.clone() as Arc<dyn DataSubscriber<MetaData>>]);

        handler
            .handle(batch(&["/ok", "/bad", "/also-ok"]), DataEvent::Update)
            .unwrap();

        assert_eq!(
            *subscriber.events.lock().unwrap(),
            vec!["sub:/ok", "sub:/also-ok"]
        );
    }

    #[test]
    fn malformed_payload_is_rejected_whole() {
        let handler: EntityHandler<MetaData> = EntityHandler::new("metadata", vec![]);
        let err = handler
            .handle(json!({"not": "a list"}), DataEvent::Update)
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedConfig { .. }));
    }

    #[test]
    fn dispatcher_routes_by_group() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let dispatcher = SyncDispatcher::new(
            EntityHandler::new("plugin", vec![]),
            EntityHandler::new("selector", vec![]),
            EntityHandler::new("rule", vec![]),
            EntityHandler::new(
                "metadata",
                vec![subscriber.clone() as Arc<dyn DataSubscriber<MetaData>>],
            ),
        );

        let raw = r#"{"groupType": "META_DATA", "eventType": "CREATE", "data": [{"path": "/m"}]}"#;
        dispatcher.dispatch_message(raw).unwrap();
        assert_eq!(*subscriber.events.lock().unwrap(), vec!["sub:/m"]);
    }
}
