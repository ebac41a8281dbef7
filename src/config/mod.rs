pub mod bootstrap;
pub mod models;

pub use bootstrap::{BootstrapConfig, LoggingConfig, SyncConfig, load_config};
