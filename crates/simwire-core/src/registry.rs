use crate::factory::ComponentFactory;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared handle to a registered factory.
pub type SharedFactory = Arc<dyn ComponentFactory>;

/// Builder for constructing an immutable component registry.
/// Two-phase lifecycle: registration -> finalization.
#[derive(Debug, Default)]
pub struct ComponentRegistryBuilder {
    factories: BTreeMap<String, SharedFactory>,
}

impl ComponentRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a binding name. An already-registered name is
    /// an error; nothing is replaced silently.
    pub fn register(
        &mut self,
        binding: &str,
        factory: SharedFactory,
    ) -> Result<&mut Self, RegistryError> {
        validate_binding(binding)?;
        if self.factories.contains_key(binding) {
            return Err(RegistryError::Duplicate(binding.to_string()));
        }
        debug!(binding, "registered component factory");
        self.factories.insert(binding.to_string(), factory);
        Ok(self)
    }

    /// Register a factory, replacing any previous one. This is the explicit
    /// clobber path for plugin policies that allow it.
    pub fn register_or_replace(
        &mut self,
        binding: &str,
        factory: SharedFactory,
    ) -> Result<Option<SharedFactory>, RegistryError> {
        validate_binding(binding)?;
        let previous = self.factories.insert(binding.to_string(), factory);
        if previous.is_some() {
            warn!(binding, "replaced existing component factory");
        }
        Ok(previous)
    }

    pub fn contains(&self, binding: &str) -> bool {
        self.factories.contains_key(binding)
    }

    /// Finalize the immutable registry.
    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            factories: self.factories,
        }
    }
}

fn validate_binding(binding: &str) -> Result<(), RegistryError> {
    if binding.is_empty() || binding.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidBinding(binding.to_string()));
    }
    Ok(())
}

/// Immutable registry of component factories keyed by binding name.
/// Constructed once at start-up and passed by reference to importers.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    factories: BTreeMap<String, SharedFactory>,
}

impl ComponentRegistry {
    /// Look up a factory by binding name.
    pub fn lookup(&self, binding: &str) -> Result<&SharedFactory, RegistryError> {
        self.factories
            .get(binding)
            .ok_or_else(|| RegistryError::NotFound(binding.to_string()))
    }

    pub fn contains(&self, binding: &str) -> bool {
        self.factories.contains_key(binding)
    }

    /// Registered binding names in sorted order.
    pub fn bindings(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// `(binding, description)` pairs in sorted order.
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.factories
            .iter()
            .map(|(binding, f)| (binding.as_str(), f.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no component factory registered for binding '{0}'")]
    NotFound(String),
    #[error("component factory already registered for binding '{0}'")]
    Duplicate(String),
    #[error("invalid binding name: '{0}'")]
    InvalidBinding(String),
}
