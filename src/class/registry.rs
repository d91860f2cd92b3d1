//! Registry of native aspect classes.
//!
//! Explicitly constructed and injected into the components that need it, so
//! tests can run against isolated registries. Never a hidden global.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use crate::class::AspectClass;
use crate::core::{AspectError, Result};
use crate::definition::AspectDefinition;
use crate::params::AspectParameters;

/// Process-wide registry of native aspect classes and their compiled-in
/// definitions.
///
/// Native classes are unique by name. Dynamic classes are never registered;
/// their identity is structural and their definitions come from the symbol
/// loader.
///
/// Lookup is concurrent and insert is idempotent per name: the map is a
/// [`DashMap`], so unrelated names never contend.
#[derive(Debug, Default)]
pub struct AspectRegistry {
    natives: DashMap<String, Arc<AspectDefinition>>,
}

impl AspectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native aspect class with its compiled-in definition.
    ///
    /// Returns the class handle on success. Fails with
    /// [`AspectError::DuplicateName`] if a native class of the same name
    /// already exists.
    pub fn register(
        &self,
        name: impl Into<String>,
        definition: AspectDefinition,
    ) -> Result<AspectClass> {
        let name = name.into();
        match self.natives.entry(name.clone()) {
            Entry::Occupied(_) => Err(AspectError::DuplicateName { name }),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(definition));
                tracing::debug!(target: "aspect::registry", "registered native aspect class '{name}'");
                Ok(AspectClass::Native { name })
            }
        }
    }

    /// Resolve a registered native class by name.
    pub fn resolve(&self, name: &str) -> Result<AspectClass> {
        if self.natives.contains_key(name) {
            Ok(AspectClass::Native { name: name.to_string() })
        } else {
            Err(AspectError::NotFound { name: name.to_string() })
        }
    }

    /// Compiled-in definition of a registered native class. Available without
    /// suspension.
    pub fn definition(&self, name: &str) -> Result<Arc<AspectDefinition>> {
        self.natives
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AspectError::NotFound { name: name.to_string() })
    }

    /// Coarse compatibility key for a `(class, parameters)` pair.
    ///
    /// Defaults to the class display name and deliberately ignores parameters
    /// and inherited sets. Callers that need caching correctness must key by
    /// [`AspectDescriptor`](crate::descriptor::AspectDescriptor) equality
    /// instead.
    pub fn compatibility_key(&self, class: &AspectClass, _parameters: &AspectParameters) -> String {
        class.display_name()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.natives.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }
}
