//! The canonical composite identity of an aspect application.
//!
//! An [`AspectDescriptor`] bundles a class, its parameters, and the
//! required-provider and attribute-aspect sets inherited from the
//! propagating context. Both sets are canonicalized (sorted, deduplicated)
//! at construction, so structurally equal descriptors are always identical
//! for caching purposes no matter how each set was assembled.
//!
//! The descriptor is the cache key for every memoized step downstream:
//! `descriptor → Aspect` resolution and
//! `(descriptor, node, configuration) → ConfiguredAspect` evaluation.

mod key;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::class::AspectClass;
use crate::params::AspectParameters;
use crate::provider::ProviderId;

/// Canonical composite identity of an aspect application.
///
/// ```
/// use aspect_engine::class::AspectClass;
/// use aspect_engine::descriptor::AspectDescriptor;
/// use aspect_engine::params::AspectParameters;
///
/// let class = AspectClass::native("checker");
/// let params = AspectParameters::builder().put("mode", ["fast"]).build();
///
/// let a = AspectDescriptor::with_inherited(
///     class.clone(),
///     params.clone(),
///     ["X".into(), "Y".into()],
///     [],
/// );
/// let b = AspectDescriptor::with_inherited(class, params, ["Y".into(), "X".into()], []);
/// // Set insertion order never affects identity or key bytes.
/// assert_eq!(a, b);
/// assert_eq!(a.serialize_key(), b.serialize_key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AspectDescriptor {
    class: AspectClass,
    parameters: AspectParameters,
    required_providers: BTreeSet<ProviderId>,
    attribute_aspects: BTreeSet<AspectClass>,
}

impl AspectDescriptor {
    /// Descriptor with no inherited sets (a directly declared aspect).
    pub fn new(class: AspectClass, parameters: AspectParameters) -> Self {
        Self {
            class,
            parameters,
            required_providers: BTreeSet::new(),
            attribute_aspects: BTreeSet::new(),
        }
    }

    /// Descriptor carrying sets inherited from the propagating context.
    /// Input order and duplicates are irrelevant; storage is canonical.
    pub fn with_inherited(
        class: AspectClass,
        parameters: AspectParameters,
        required_providers: impl IntoIterator<Item = ProviderId>,
        attribute_aspects: impl IntoIterator<Item = AspectClass>,
    ) -> Self {
        Self {
            class,
            parameters,
            required_providers: required_providers.into_iter().collect(),
            attribute_aspects: attribute_aspects.into_iter().collect(),
        }
    }

    pub fn class(&self) -> &AspectClass {
        &self.class
    }

    pub fn parameters(&self) -> &AspectParameters {
        &self.parameters
    }

    /// Provider identities inherited from the propagating context. Treated
    /// as a conjunctive filter on top of the definition's own predicate.
    pub fn required_providers(&self) -> &BTreeSet<ProviderId> {
        &self.required_providers
    }

    /// Aspect classes inherited for further attribute propagation.
    pub fn attribute_aspects(&self) -> &BTreeSet<AspectClass> {
        &self.attribute_aspects
    }

    /// Deterministic, version-stamped binary encoding of the canonical form,
    /// suitable as a persisted or distributed cache key.
    pub fn serialize_key(&self) -> Vec<u8> {
        key::serialize(self)
    }

    /// `sha256:<hex>` digest of [`serialize_key`](Self::serialize_key), for
    /// callers that want a fixed-width key.
    pub fn key_digest(&self) -> String {
        key::digest(self)
    }
}

impl fmt::Display for AspectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class)?;
        if !self.parameters.is_empty() {
            write!(f, "({})", self.parameters)?;
        }
        Ok(())
    }
}
