//! Worker method/event schema, announced at readiness.
//!
//! A worker's very first message on its private channel is a `Hello`
//! envelope carrying this schema. The host validates calls against it, so
//! a typo'd method name fails with `UnknownEndpoint` on the host side
//! without ever waking the worker thread.

use std::collections::HashSet;

/// The named surface a worker role exposes.
#[derive(Debug, Clone, Default)]
pub struct WorkerSchema {
    methods: HashSet<String>,
    events: HashSet<String>,
}

impl WorkerSchema {
    /// Build a schema from announced method and event names.
    pub fn new(methods: Vec<String>, events: Vec<String>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            events: events.into_iter().collect(),
        }
    }

    /// Whether the worker exposes the given method.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }

    /// Whether the worker declared the given event.
    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains(name)
    }

    /// Number of exposed methods.
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() {
        let schema = WorkerSchema::new(
            vec!["increment".to_string(), "get_count".to_string()],
            vec!["counter/updated".to_string()],
        );

        assert!(schema.has_method("increment"));
        assert!(schema.has_method("get_count"));
        assert!(!schema.has_method("reset"));
        assert!(schema.has_event("counter/updated"));
        assert!(!schema.has_event("counter/reset"));
        assert_eq!(schema.method_count(), 2);
    }
}
