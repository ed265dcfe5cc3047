//! Process-wide provider registry.
//!
//! The registered set is fixed at initialization: providers are immutable
//! singletons created once and shared for the life of the process. Lookups
//! are by stable name; iteration follows registration order, which also
//! defines the scanner's tie-breaking order.

use super::catalog::{
    Anthropic, Cohere, GoogleGemini, Groq, HuggingFace, LangSmith, OpenAi, Replicate,
};
use super::Provider;
use std::collections::HashMap;
use std::sync::OnceLock;

static GLOBAL_REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();

/// Construction-once collection of providers keyed by name.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
    by_name: HashMap<&'static str, usize>,
}

impl ProviderRegistry {
    /// Build a registry from an explicit provider list. Registration order is
    /// preserved. Panics on a duplicate name: that is a programmer error.
    pub fn with_providers(providers: Vec<Box<dyn Provider>>) -> Self {
        let mut by_name = HashMap::with_capacity(providers.len());
        for (index, provider) in providers.iter().enumerate() {
            let previous = by_name.insert(provider.name(), index);
            assert!(
                previous.is_none(),
                "duplicate provider registered: {}",
                provider.name()
            );
        }
        Self { providers, by_name }
    }

    /// The full built-in catalog, in its canonical registration order.
    pub fn builtin() -> Self {
        Self::with_providers(vec![
            Box::new(OpenAi::new()),
            Box::new(Anthropic::new()),
            Box::new(HuggingFace::new()),
            Box::new(Cohere::new()),
            Box::new(Replicate::new()),
            Box::new(GoogleGemini::new()),
            Box::new(Groq::new()),
            Box::new(LangSmith::new()),
        ])
    }

    /// The shared process-wide registry, built on first use.
    pub fn global() -> &'static ProviderRegistry {
        GLOBAL_REGISTRY.get_or_init(Self::builtin)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.by_name.get(name).map(|&i| self.providers[i].as_ref())
    }

    /// Position of `name` in registration order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Provider> {
        self.providers.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_full_catalog_in_order() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec![
                "openai",
                "anthropic",
                "huggingface",
                "cohere",
                "replicate",
                "google_gemini",
                "groq",
                "langsmith",
            ]
        );
    }

    #[test]
    fn lookup_by_name_round_trips() {
        let registry = ProviderRegistry::builtin();
        for (index, provider) in registry.iter().enumerate() {
            assert_eq!(registry.index_of(provider.name()), Some(index));
            assert_eq!(
                registry.get(provider.name()).unwrap().name(),
                provider.name()
            );
        }
    }

    #[test]
    fn unknown_provider_is_absent() {
        let registry = ProviderRegistry::builtin();
        assert!(registry.get("slack").is_none());
        assert!(registry.index_of("slack").is_none());
    }

    #[test]
    fn every_provider_has_at_least_one_pattern() {
        for provider in ProviderRegistry::builtin().iter() {
            assert!(
                !provider.patterns().is_empty(),
                "{} has no detection patterns",
                provider.name()
            );
            assert!(!provider.validation_endpoint().is_empty());
            assert!(!provider.display_name().is_empty());
        }
    }

    #[test]
    fn global_registry_is_shared() {
        let a = ProviderRegistry::global();
        let b = ProviderRegistry::global();
        assert!(std::ptr::eq(a, b));
    }
}
