//! Static aspect definitions and resolved aspects.
//!
//! An [`AspectDefinition`] is the loaded-once description of what an aspect
//! requires, which attributes it re-propagates along, and which providers it
//! promises to produce. For native classes it is compiled into the registry;
//! for dynamic classes it comes from the symbol loader and is memoized per
//! `(location, symbol)`.
//!
//! An [`Aspect`] pairs a canonical descriptor with its definition. It exists
//! only after loading completes, is immutable, and is shared as
//! `Arc<Aspect>` across every caller whose descriptor compares equal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::descriptor::AspectDescriptor;
use crate::provider::{ProviderId, ProviderMap};

/// Required-provider predicate: a disjunction of conjunctive provider sets.
///
/// A candidate node satisfies the predicate when at least one full set is
/// present among its own providers. The empty disjunction is trivially
/// satisfied: an aspect that requires nothing applies everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPredicate {
    any_of: Vec<BTreeSet<ProviderId>>,
}

impl ProviderPredicate {
    /// Predicate satisfied by every node.
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Predicate requiring every one of `ids` to be present.
    pub fn require_all(ids: impl IntoIterator<Item = ProviderId>) -> Self {
        Self { any_of: vec![ids.into_iter().collect()] }
    }

    /// Predicate satisfied when at least one of `sets` is fully present.
    pub fn any_of(sets: impl IntoIterator<Item = BTreeSet<ProviderId>>) -> Self {
        Self { any_of: sets.into_iter().collect() }
    }

    pub fn is_trivial(&self) -> bool {
        self.any_of.is_empty()
    }

    pub fn satisfied_by(&self, providers: &ProviderMap) -> bool {
        self.any_of.is_empty() || self.any_of.iter().any(|set| providers.contains_all(set))
    }
}

/// The static shape of an aspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectDefinition {
    /// Predicate a candidate node's own providers must satisfy for this
    /// aspect to apply. Unsatisfied means silent skip, never an error.
    pub required_providers: ProviderPredicate,
    /// Attribute names along which this aspect re-propagates.
    pub propagate_along: BTreeSet<String>,
    /// Provider identities this aspect promises to produce.
    pub advertised_providers: BTreeSet<ProviderId>,
}

impl AspectDefinition {
    pub fn new(
        required_providers: ProviderPredicate,
        propagate_along: impl IntoIterator<Item = String>,
        advertised_providers: impl IntoIterator<Item = ProviderId>,
    ) -> Self {
        Self {
            required_providers,
            propagate_along: propagate_along.into_iter().collect(),
            advertised_providers: advertised_providers.into_iter().collect(),
        }
    }

    pub fn propagates_along(&self, attribute: &str) -> bool {
        self.propagate_along.contains(attribute)
    }

    pub fn advertises(&self, id: &ProviderId) -> bool {
        self.advertised_providers.contains(id)
    }
}

/// A resolved aspect: descriptor plus loaded definition.
///
/// Identity is descriptor equality, never object identity of the caller's
/// input. Equal descriptors always resolve to the same shared `Arc<Aspect>`
/// through the resolver's single-flight cache.
#[derive(Debug, Clone)]
pub struct Aspect {
    descriptor: AspectDescriptor,
    definition: Arc<AspectDefinition>,
}

impl Aspect {
    pub fn new(descriptor: AspectDescriptor, definition: Arc<AspectDefinition>) -> Self {
        Self { descriptor, definition }
    }

    pub fn descriptor(&self) -> &AspectDescriptor {
        &self.descriptor
    }

    pub fn definition(&self) -> &AspectDefinition {
        &self.definition
    }
}

impl PartialEq for Aspect {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl Eq for Aspect {}

impl Hash for Aspect {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.descriptor.hash(state);
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.descriptor.fmt(f)
    }
}
