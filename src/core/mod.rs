//! Routing core: matching, the plugin chain, load balancing and the
//! per-request exchange model.
pub mod chain;
pub mod context;
pub mod gateway;
pub mod load_balancer;
pub mod matching;
pub mod result;
pub mod upstream;

pub use gateway::Gateway;
