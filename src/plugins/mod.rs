//! Built-in chain plugins.
//!
//! Orders are spaced so operators can slot custom stages between the built-in
//! ones without renumbering. The global plugin runs before everything and is
//! the only stage with a negative order.
pub mod divide;
pub mod dubbo;
pub mod global;
pub mod rate_limiter;
pub mod web_client;

/// Chain-registered plugin names, matching `PluginData.name` pushed by the
/// control plane.
pub mod names {
    pub const GLOBAL: &str = "global";
    pub const RATE_LIMITER: &str = "rate_limiter";
    pub const DIVIDE: &str = "divide";
    pub const DUBBO: &str = "dubbo";
    pub const WEB_CLIENT: &str = "web_client";
}

/// Execution orders of the built-in stages, ascending.
pub mod orders {
    pub const GLOBAL: i32 = -1;
    pub const RATE_LIMITER: i32 = 20;
    pub const DIVIDE: i32 = 50;
    pub const DUBBO: i32 = 60;
    pub const WEB_CLIENT: i32 = 100;
}

pub use divide::{DividePlugin, DivideSelectorHandler};
pub use dubbo::DubboPlugin;
pub use global::GlobalPlugin;
pub use rate_limiter::{RateLimiterConfigHandler, RateLimiterPlugin};
pub use web_client::WebClientPlugin;
