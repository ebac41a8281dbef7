//! Type-keyed registry for process-wide resources built from pushed
//! configuration (rate limiter backend clients and their configs).
//!
//! One registry lives inside each gateway instance and is passed by handle to
//! the components that need it, so tests can run with isolated instances.
//! Publishing a value replaces any prior one of the same type; in-flight
//! users keep their `Arc` and drain against the old resource.
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, RwLock},
};

#[derive(Default)]
pub struct SingletonRegistry {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `value`, replacing any previous instance of the same type.
    pub fn put<T: Any + Send + Sync>(&self, value: T) {
        let mut entries = self.entries.write().expect("singleton registry poisoned");
        entries.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Fetch the current instance of `T`, if one has been published.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let entries = self.entries.read().expect("singleton registry poisoned");
        entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|entry| entry.downcast::<T>().ok())
    }

    /// Drop the current instance of `T`, if any.
    pub fn remove<T: Any + Send + Sync>(&self) {
        let mut entries = self.entries.write().expect("singleton registry poisoned");
        entries.remove(&TypeId::of::<T>());
    }
}
