//! Provider availability lookup
//!
//! The runner only asks one question: is this provider available right now.
//! Registries are injected per runner, so concurrent runs and tests never
//! share process-wide state.

use parking_lot::RwLock;
use rustc_hash::FxHashSet;

pub trait ProviderRegistry: Send + Sync {
    fn is_available(&self, provider_id: &str) -> bool;
}

/// Explicit set of available providers
#[derive(Debug, Default)]
pub struct StaticRegistry {
    providers: RwLock<FxHashSet<String>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider_id: impl Into<String>) {
        self.providers.write().insert(provider_id.into());
    }

    /// Returns true if the provider was registered
    pub fn unregister(&self, provider_id: &str) -> bool {
        self.providers.write().remove(provider_id)
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

impl ProviderRegistry for StaticRegistry {
    fn is_available(&self, provider_id: &str) -> bool {
        self.providers.read().contains(provider_id)
    }
}

impl<S: Into<String>> FromIterator<S> for StaticRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            providers: RwLock::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}

/// Treats every named provider as available
///
/// Nodes without any provider are still skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ProviderRegistry for AcceptAll {
    fn is_available(&self, _provider_id: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister() {
        let registry = StaticRegistry::new();
        assert!(!registry.is_available("writer"));

        registry.register("writer");
        assert!(registry.is_available("writer"));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister("writer"));
        assert!(!registry.unregister("writer"));
        assert!(registry.is_empty());
    }

    #[test]
    fn from_iterator() {
        let registry: StaticRegistry = ["a", "b"].into_iter().collect();
        assert!(registry.is_available("a"));
        assert!(registry.is_available("b"));
        assert!(!registry.is_available("c"));
    }

    #[test]
    fn accept_all() {
        assert!(AcceptAll.is_available("anything"));
    }
}
