//! Incremental configuration synchronization.
//!
//! The control plane pushes serialized entity batches tagged with a config
//! group and an event type; handlers convert them into typed batches and fan
//! refresh / update / delete notifications out to the local caches. Each
//! entity kind runs through its own independent handler instance — batches of
//! different kinds carry no ordering guarantee relative to each other.
pub mod cache;
pub mod handler;
pub mod subscriber;

use serde::{Deserialize, Serialize};

/// Entity kind tag carried on every push payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigGroup {
    Plugin,
    Selector,
    Rule,
    MetaData,
}

/// Operation tag. `Create` and `Update` are indistinguishable to
/// subscribers: both mean "this entity's current state is X".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataEvent {
    Refresh,
    Create,
    Update,
    Delete,
}

/// One push event as it arrives off the sync transport. `data` stays a raw
/// JSON value until the group-specific handler converts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub group_type: ConfigGroup,
    pub event_type: DataEvent,
    pub data: serde_json::Value,
}
