//! Endpoint registry — stable operation names and their contracts.
//!
//! Both sides of a bus build their registry at static initialization time
//! and freeze it behind an `Arc`. The two sides are not required to agree
//! up front; a caller using a name the handler side never defined surfaces
//! as `UnknownEndpoint` at the first call, not at registration.
//!
//! # Example
//!
//! ```
//! use launchwire::registry::{EndpointKind, EndpointRegistry};
//!
//! let mut registry = EndpointRegistry::new();
//! registry.define("counter/increment", EndpointKind::Command).unwrap();
//! registry.define("counter/updated", EndpointKind::Event).unwrap();
//!
//! assert_eq!(
//!     registry.resolve("counter/increment").unwrap(),
//!     EndpointKind::Command
//! );
//! ```

use std::collections::HashMap;

use crate::error::{BusError, Result};

/// What shape of exchange an endpoint name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Request/response with exactly one handler on the receiving side.
    Command,
    /// Fire-and-forget notification with zero-or-more subscribers.
    Event,
}

/// Registry mapping operation names to endpoint kinds.
///
/// Immutable for process lifetime once construction finishes.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, EndpointKind>,
}

impl EndpointRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint once.
    ///
    /// Re-defining a name with the same kind is a no-op; re-defining with a
    /// different kind fails with [`BusError::DuplicateEndpoint`].
    pub fn define(&mut self, name: &str, kind: EndpointKind) -> Result<()> {
        match self.endpoints.get(name) {
            Some(existing) if *existing != kind => {
                Err(BusError::DuplicateEndpoint(name.to_string()))
            }
            Some(_) => Ok(()),
            None => {
                self.endpoints.insert(name.to_string(), kind);
                Ok(())
            }
        }
    }

    /// Look up an endpoint, failing with [`BusError::UnknownEndpoint`] if the
    /// name was never defined.
    pub fn resolve(&self, name: &str) -> Result<EndpointKind> {
        self.endpoints
            .get(name)
            .copied()
            .ok_or_else(|| BusError::UnknownEndpoint(name.to_string()))
    }

    /// Resolve and require a specific kind.
    ///
    /// Fails with [`BusError::KindMismatch`] when the name is defined but
    /// with the other kind — e.g. `trigger` on an Event endpoint.
    pub fn expect(&self, name: &str, expected: EndpointKind) -> Result<()> {
        let actual = self.resolve(name)?;
        if actual != expected {
            return Err(BusError::KindMismatch {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Number of defined endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_resolve() {
        let mut registry = EndpointRegistry::new();
        registry.define("replays/load-folder", EndpointKind::Command).unwrap();
        registry.define("replays/progress", EndpointKind::Event).unwrap();

        assert_eq!(
            registry.resolve("replays/load-folder").unwrap(),
            EndpointKind::Command
        );
        assert_eq!(
            registry.resolve("replays/progress").unwrap(),
            EndpointKind::Event
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_endpoint() {
        let registry = EndpointRegistry::new();
        let err = registry.resolve("never/defined").unwrap_err();
        assert!(matches!(err, BusError::UnknownEndpoint(name) if name == "never/defined"));
    }

    #[test]
    fn test_redefine_same_kind_is_noop() {
        let mut registry = EndpointRegistry::new();
        registry.define("counter/get", EndpointKind::Command).unwrap();
        registry.define("counter/get", EndpointKind::Command).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_redefine_conflicting_kind_fails() {
        let mut registry = EndpointRegistry::new();
        registry.define("counter/get", EndpointKind::Command).unwrap();

        let err = registry
            .define("counter/get", EndpointKind::Event)
            .unwrap_err();
        assert!(matches!(err, BusError::DuplicateEndpoint(name) if name == "counter/get"));
    }

    #[test]
    fn test_expect_kind_mismatch() {
        let mut registry = EndpointRegistry::new();
        registry.define("counter/updated", EndpointKind::Event).unwrap();

        registry
            .expect("counter/updated", EndpointKind::Event)
            .unwrap();

        let err = registry
            .expect("counter/updated", EndpointKind::Command)
            .unwrap_err();
        assert!(matches!(
            err,
            BusError::KindMismatch {
                expected: EndpointKind::Command,
                actual: EndpointKind::Event,
                ..
            }
        ));
    }
}
