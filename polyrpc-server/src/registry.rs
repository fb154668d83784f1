//! Method registry
//!
//! Maps procedure names to their [`Procedure`] descriptors. Registration is
//! last-write-wins and case-sensitive. Lookups take a shared read lock, so
//! dispatch stays safe even if a procedure is registered while requests are
//! in flight.
//!
//! Registries are cheap to clone: clones share the same table. Independent
//! registries come from [`Registry::new`].
//!
//! ```rust
//! use polyrpc_server::{from_fn, Procedure, Registry};
//! use serde_json::json;
//!
//! let registry = Registry::new();
//! registry.register(Procedure::new("ping", from_fn(|_, _| async { Ok(json!("pong")) })));
//!
//! assert!(registry.contains("ping"));
//! assert!(registry.lookup("pong").is_err());
//! ```

use crate::procedure::Procedure;
use parking_lot::RwLock;
use polyrpc_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

type Table = RwLock<BTreeMap<String, Arc<Procedure>>>;

/// Shared table of registered procedures
#[derive(Clone, Default)]
pub struct Registry {
    procedures: Arc<Table>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure under its own name
    ///
    /// Returns the procedure previously registered under that name, if any.
    pub fn register(&self, procedure: Procedure) -> Option<Arc<Procedure>> {
        let name = procedure.name().to_string();
        tracing::debug!(method = %name, "Registering procedure");
        self.procedures.write().insert(name, Arc::new(procedure))
    }

    /// Get a procedure by name
    pub fn get(&self, name: &str) -> Option<Arc<Procedure>> {
        self.procedures.read().get(name).cloned()
    }

    /// Get a procedure by name, or a Method Not Found error listing every
    /// registered name
    pub fn lookup(&self, name: &str) -> Result<Arc<Procedure>> {
        let table = self.procedures.read();
        match table.get(name) {
            Some(procedure) => Ok(Arc::clone(procedure)),
            None => {
                let available = table.keys().cloned().collect::<Vec<_>>().join(", ");
                Err(Error::MethodNotFound(format!(
                    "Method not found. Available methods: {}",
                    available
                )))
            }
        }
    }

    /// Check if a method is registered
    pub fn contains(&self, name: &str) -> bool {
        self.procedures.read().contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.procedures.read().keys().cloned().collect()
    }

    /// Registered procedures in name order
    pub fn procedures(&self) -> Vec<Arc<Procedure>> {
        self.procedures.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.procedures.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.read().is_empty()
    }

    /// Non-owning handle, for procedures that need to read the registry
    /// they are registered in
    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            procedures: Arc::downgrade(&self.procedures),
        }
    }
}

/// Registry handle that does not keep the table alive
#[derive(Clone)]
pub struct WeakRegistry {
    procedures: Weak<Table>,
}

impl WeakRegistry {
    /// Get the registry back if it still exists
    pub fn upgrade(&self) -> Option<Registry> {
        self.procedures
            .upgrade()
            .map(|procedures| Registry { procedures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::from_fn;
    use serde_json::json;

    fn constant(name: &str, value: serde_json::Value) -> Procedure {
        Procedure::new(
            name,
            from_fn(move |_, _| {
                let value = value.clone();
                async move { Ok(value) }
            }),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        assert!(registry.is_empty());

        registry.register(constant("test", json!(1)));

        assert!(registry.contains("test"));
        assert!(!registry.contains("Test"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("test").unwrap().name(), "test");
    }

    #[test]
    fn test_last_write_wins() {
        let registry = Registry::new();
        assert!(registry.register(constant("dup", json!(1)).summary("first")).is_none());

        let previous = registry.register(constant("dup", json!(2)).summary("second"));
        assert_eq!(previous.unwrap().summary_text(), "first");
        assert_eq!(registry.get("dup").unwrap().summary_text(), "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_method_not_found_lists_names() {
        let registry = Registry::new();
        registry.register(constant("b.second", json!(null)));
        registry.register(constant("a.first", json!(null)));

        let err = registry.lookup("missing").unwrap_err();
        assert_eq!(err.code(), -32601);
        assert_eq!(
            err.to_error_data(false).message,
            "Method not found. Available methods: a.first, b.second"
        );
        assert_eq!(registry.names(), vec!["a.first", "b.second"]);
    }

    #[test]
    fn test_clones_share_independent_registries_do_not() {
        let registry = Registry::new();
        let shared = registry.clone();
        let independent = Registry::new();

        shared.register(constant("x", json!(1)));

        assert!(registry.contains("x"));
        assert!(!independent.contains("x"));
    }

    #[test]
    fn test_weak_handle() {
        let registry = Registry::new();
        let weak = registry.downgrade();
        registry.register(constant("x", json!(1)));

        assert!(weak.upgrade().unwrap().contains("x"));

        drop(registry);
        assert!(weak.upgrade().is_none());
    }
}
