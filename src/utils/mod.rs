pub mod path_match;
pub mod singleton;

pub use singleton::SingletonRegistry;
