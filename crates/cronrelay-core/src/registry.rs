//! Job handler capability registry.
//!
//! Handlers are registered by `(mdl, fn)` at startup. Job creation validates
//! against this registry, and runners resolve handlers from it at dispatch.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use cronrelay_protocols::JobHandler;

use crate::error::RegistryError;

/// Registry key for a handler.
pub fn handler_key(mdl: &str, function: &str) -> String {
    format!("{}.{}", mdl, function)
}

/// Thread-safe registry of job handlers.
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler under its `module().function()` key.
    ///
    /// Returns an error if a handler with the same key is already registered.
    pub fn register(&self, handler: Arc<dyn JobHandler>) -> Result<(), RegistryError> {
        let key = handler_key(handler.module(), handler.function());
        if self.handlers.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        debug!("Registered job handler {}", key);
        self.handlers.insert(key, handler);
        Ok(())
    }

    pub fn unregister(&self, mdl: &str, function: &str) -> Result<(), RegistryError> {
        let key = handler_key(mdl, function);
        self.handlers
            .remove(&key)
            .ok_or(RegistryError::NotFound(key))?;
        Ok(())
    }

    pub fn resolve(&self, mdl: &str, function: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers
            .get(&handler_key(mdl, function))
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, mdl: &str, function: &str) -> bool {
        self.handlers.contains_key(&handler_key(mdl, function))
    }

    /// Registered keys, sorted.
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cronrelay_protocols::{HandlerError, JobContext};

    struct TestHandler {
        mdl: &'static str,
        function: &'static str,
    }

    #[async_trait]
    impl JobHandler for TestHandler {
        fn module(&self) -> &str {
            self.mdl
        }

        fn function(&self) -> &str {
            self.function
        }

        async fn run(&self, _ctx: JobContext) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    fn handler(mdl: &'static str, function: &'static str) -> Arc<dyn JobHandler> {
        Arc::new(TestHandler { mdl, function })
    }

    #[test]
    fn test_registry_new() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = HandlerRegistry::new();
        registry.register(handler("reports", "nightly")).unwrap();

        assert!(registry.contains("reports", "nightly"));
        assert!(registry.resolve("reports", "nightly").is_some());
        assert!(registry.resolve("reports", "weekly").is_none());
        assert!(registry.resolve("nightly", "reports").is_none());
    }

    #[test]
    fn test_register_duplicate() {
        let registry = HandlerRegistry::new();
        registry.register(handler("reports", "nightly")).unwrap();
        let result = registry.register(handler("reports", "nightly"));
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(k)) if k == "reports.nightly"));
    }

    #[test]
    fn test_unregister() {
        let registry = HandlerRegistry::new();
        registry.register(handler("reports", "nightly")).unwrap();
        registry.unregister("reports", "nightly").unwrap();
        assert!(registry.is_empty());
        assert!(registry.unregister("reports", "nightly").is_err());
    }

    #[test]
    fn test_list_keys_sorted() {
        let registry = HandlerRegistry::new();
        registry.register(handler("b", "two")).unwrap();
        registry.register(handler("a", "one")).unwrap();
        assert_eq!(registry.list_keys(), vec!["a.one", "b.two"]);
    }
}
