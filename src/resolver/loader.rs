//! The dynamic symbol loader seam.
//!
//! Loading the definition of a dynamic aspect class is the engine's first
//! suspension point. The loader is an external collaborator: given a
//! `(source location, symbol)` pair it produces a [`RawDefinition`] or
//! fails, and it may itself require recursive graph evaluation (loading the
//! source unit that defines the symbol). Recursive loaders must pass the
//! [`LoadContext`] they receive back into any nested resolution so cyclic
//! loads are detected instead of deadlocking.

use async_trait::async_trait;
use std::collections::BTreeSet;

use super::LoadContext;
use crate::class::SourceLocation;
use crate::definition::{AspectDefinition, ProviderPredicate};
use crate::provider::ProviderId;

/// The loader-facing shape of a dynamic aspect definition, before
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDefinition {
    /// Disjunction of conjunctive required-provider sets.
    pub required_providers: Vec<BTreeSet<ProviderId>>,
    /// Attribute names the aspect re-propagates along.
    pub propagate_along: BTreeSet<String>,
    /// Providers the aspect promises to produce.
    pub advertised_providers: BTreeSet<ProviderId>,
}

impl RawDefinition {
    /// Validate the raw shape into a definition. An `Err` means the loaded
    /// symbol is not aspect-like; the resolver reports it as a load failure.
    pub(crate) fn into_definition(self) -> Result<AspectDefinition, String> {
        for attribute in &self.propagate_along {
            if attribute.is_empty() {
                return Err("propagation attribute name must not be empty".to_string());
            }
        }
        Ok(AspectDefinition {
            required_providers: ProviderPredicate::any_of(self.required_providers),
            propagate_along: self.propagate_along,
            advertised_providers: self.advertised_providers,
        })
    }
}

/// External collaborator that loads dynamic aspect definitions.
///
/// The sole suspension point for dynamic-class definition loading. Results
/// are memoized per `(location, symbol)` by the resolver, so a conforming
/// loader is invoked at most once per pair regardless of concurrency.
#[async_trait]
pub trait SymbolLoader: Send + Sync {
    /// Load the named symbol from a source unit.
    ///
    /// Errors are wrapped into [`AspectError::Load`] by the resolver, except
    /// an [`AspectError::CyclicLoad`] surfaced from nested resolution, which
    /// passes through unchanged.
    ///
    /// [`AspectError::Load`]: crate::core::AspectError::Load
    /// [`AspectError::CyclicLoad`]: crate::core::AspectError::CyclicLoad
    async fn load(
        &self,
        location: &SourceLocation,
        symbol: &str,
        ctx: &LoadContext,
    ) -> anyhow::Result<RawDefinition>;
}
