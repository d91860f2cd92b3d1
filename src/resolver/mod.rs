//! Aspect definition loading and descriptor-keyed resolution.
//!
//! [`AspectResolver`] turns aspect classes into loaded definitions and
//! descriptors into shared [`Aspect`]s:
//!
//! - Native classes resolve from the injected [`AspectRegistry`] without
//!   suspension.
//! - Dynamic classes suspend on the external [`SymbolLoader`]; the result is
//!   memoized per `(location, symbol)` with single-flight join semantics, so
//!   repeated or concurrent requests never reload.
//! - `resolve_aspect` combines the loaded definition with the descriptor's
//!   parameters, cached by descriptor equality: every caller holding an
//!   equal descriptor observes the same shared `Arc<Aspect>`.
//!
//! # Cyclic loads
//!
//! A loader may recursively require graph evaluation, which can route back
//! into this resolver. Cycles are detected through an explicit in-progress
//! set threaded along the load path ([`LoadContext`]), never by stack depth.
//! The check runs *before* joining the memo flight; joining one's own
//! in-flight load would wait on itself forever instead of reporting
//! [`AspectError::CyclicLoad`].

mod loader;

pub use loader::{RawDefinition, SymbolLoader};

use std::collections::HashSet;
use std::sync::Arc;

use crate::class::{AspectClass, AspectRegistry, SourceLocation};
use crate::core::{AspectError, Result};
use crate::definition::{Aspect, AspectDefinition};
use crate::descriptor::AspectDescriptor;
use crate::flight::MemoCache;

/// Memo key for dynamic definition loads.
type DynamicKey = (SourceLocation, String);

/// The set of dynamic loads in progress on the current resolution path.
///
/// Cloned-and-extended for nested calls; never shared mutable state. A
/// concurrent, unrelated request for the same key carries its own context
/// and joins the memo flight instead of tripping the cycle check.
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    in_progress: HashSet<DynamicKey>,
}

impl LoadContext {
    /// Context for a fresh resolution path with no loads in progress.
    pub fn root() -> Self {
        Self::default()
    }

    /// True when the `(location, symbol)` load is already active on this
    /// path.
    pub fn is_loading(&self, location: &SourceLocation, symbol: &str) -> bool {
        self.in_progress.contains(&(location.clone(), symbol.to_string()))
    }

    fn entered(&self, location: &SourceLocation, symbol: &str) -> Self {
        let mut child = self.clone();
        child.in_progress.insert((location.clone(), symbol.to_string()));
        child
    }
}

/// Resolves aspect classes to definitions and descriptors to shared aspects.
pub struct AspectResolver {
    registry: Arc<AspectRegistry>,
    loader: Arc<dyn SymbolLoader>,
    definitions: MemoCache<DynamicKey, AspectDefinition>,
    aspects: MemoCache<AspectDescriptor, Aspect>,
}

impl AspectResolver {
    pub fn new(registry: Arc<AspectRegistry>, loader: Arc<dyn SymbolLoader>) -> Self {
        Self {
            registry,
            loader,
            definitions: MemoCache::new(),
            aspects: MemoCache::new(),
        }
    }

    pub fn registry(&self) -> &Arc<AspectRegistry> {
        &self.registry
    }

    /// Load the definition of an aspect class.
    ///
    /// Native classes return the compiled-in definition without suspension.
    /// Dynamic classes suspend on the loader, memoized per
    /// `(location, symbol)`.
    pub async fn load_definition(
        &self,
        class: &AspectClass,
        ctx: &LoadContext,
    ) -> Result<Arc<AspectDefinition>> {
        match class {
            AspectClass::Native { name } => self.registry.definition(name),
            AspectClass::Dynamic { location, symbol } => {
                if ctx.is_loading(location, symbol) {
                    return Err(AspectError::CyclicLoad {
                        location: location.clone(),
                        symbol: symbol.clone(),
                    });
                }
                let key = (location.clone(), symbol.clone());
                self.definitions
                    .get_or_compute(key, || async {
                        tracing::debug!(
                            target: "aspect::resolver",
                            "loading dynamic aspect '{symbol}' from {location}"
                        );
                        let child = ctx.entered(location, symbol);
                        let raw = self
                            .loader
                            .load(location, symbol, &child)
                            .await
                            .map_err(|err| wrap_load_error(location, symbol, err))?;
                        raw.into_definition().map_err(|reason| AspectError::Load {
                            location: location.clone(),
                            symbol: symbol.clone(),
                            reason,
                        })
                    })
                    .await
            }
        }
    }

    /// Resolve a descriptor to its shared aspect.
    ///
    /// Single-flight cached by descriptor equality: N concurrent callers for
    /// an equal descriptor trigger at most one definition load, and repeated
    /// calls return the same `Arc<Aspect>`.
    pub async fn resolve_aspect(
        &self,
        descriptor: &AspectDescriptor,
        ctx: &LoadContext,
    ) -> Result<Arc<Aspect>> {
        if let AspectClass::Dynamic { location, symbol } = descriptor.class() {
            if ctx.is_loading(location, symbol) {
                return Err(AspectError::CyclicLoad {
                    location: location.clone(),
                    symbol: symbol.clone(),
                });
            }
        }
        self.aspects
            .get_or_compute(descriptor.clone(), || async {
                let definition = self.load_definition(descriptor.class(), ctx).await?;
                tracing::trace!(
                    target: "aspect::resolver",
                    "resolved aspect {descriptor}"
                );
                Ok(Aspect::new(descriptor.clone(), definition))
            })
            .await
    }
}

/// Wrap a loader failure, letting a `CyclicLoad` surfaced from nested
/// resolution pass through unchanged.
fn wrap_load_error(location: &SourceLocation, symbol: &str, err: anyhow::Error) -> AspectError {
    match err.downcast::<AspectError>() {
        Ok(aspect_err @ AspectError::CyclicLoad { .. }) => aspect_err,
        Ok(aspect_err) => AspectError::Load {
            location: location.clone(),
            symbol: symbol.to_string(),
            reason: aspect_err.to_string(),
        },
        Err(other) => AspectError::Load {
            location: location.clone(),
            symbol: symbol.to_string(),
            reason: format!("{other:#}"),
        },
    }
}
