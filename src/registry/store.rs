//! Concurrent service registry.

use dashmap::DashMap;

use crate::config::ServiceConfig;
use crate::registry::descriptor::{ServiceDescriptor, ServiceUpdate};

/// Mapping from service key to its descriptor.
///
/// Written at startup, read on every request. `update` may interleave with
/// concurrent reads; each entry is replaced under its shard lock.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, ServiceDescriptor>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured services.
    pub fn from_config(services: &[ServiceConfig]) -> Self {
        let registry = Self::new();
        for service in services {
            registry.register(ServiceDescriptor::from(service));
        }
        registry
    }

    /// Register (or replace) a service.
    pub fn register(&self, descriptor: ServiceDescriptor) {
        tracing::debug!(service = %descriptor.key, base_url = %descriptor.base_url, "Service registered");
        self.services.insert(descriptor.key.clone(), descriptor);
    }

    /// Look up a service by key.
    pub fn get(&self, key: &str) -> Option<ServiceDescriptor> {
        self.services.get(key).map(|entry| entry.value().clone())
    }

    /// All registered services, ordered by key.
    pub fn all(&self) -> Vec<ServiceDescriptor> {
        let mut all: Vec<_> = self.services.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    pub fn has(&self, key: &str) -> bool {
        self.services.contains_key(key)
    }

    /// Merge a partial update into a service. Unknown keys are ignored.
    pub fn update(&self, key: &str, update: ServiceUpdate) {
        match self.services.get_mut(key) {
            Some(mut entry) => {
                entry.apply(update);
                tracing::info!(service = %key, "Service descriptor updated");
            }
            None => {
                tracing::debug!(service = %key, "Ignoring update for unknown service");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
