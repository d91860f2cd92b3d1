//! Aspect identity, resolution, and propagation for build dependency graphs.
//!
//! An *aspect* is a supplemental, cacheable computation attached to a
//! dependency edge of a build graph: as target analysis traverses an
//! attribute toward a dependency node, aspects declared on the attribute
//! (and aspects inherited from the source node's already-applied aspects)
//! are resolved, checked for applicability against the dependency's own
//! outputs, evaluated, and merged into the result the requester observes.
//!
//! This crate owns the aspect-specific layer only: identity, resolution,
//! propagation, caching, and merge. The rule/target definition loader, the
//! language runtime that interprets dynamic aspect specifications, concrete
//! provider payload semantics, and action scheduling are external
//! collaborators behind the [`resolver::SymbolLoader`] and
//! [`engine::Evaluator`] seams.
//!
//! # Data flow
//!
//! ```text
//! requester ──(attribute, declared aspects)──▶ PropagationEngine
//!     │ propagation closure of AspectDescriptors
//!     ▼
//! AspectResolver ──(descriptor → Arc<Aspect>, single-flight cached)
//!     │ applicability filter against the node's own providers
//!     ▼
//! Evaluator ──((descriptor, node, configuration) → ConfiguredAspect, cached)
//!     │
//!     ▼
//! merge: native providers ∪ aspect providers ──▶ augmented view
//! ```
//!
//! # Identity
//!
//! Every memoized step downstream keys on
//! [`AspectDescriptor`](descriptor::AspectDescriptor): a canonical composite
//! of class, parameters, and inherited sets. Descriptors built from equal
//! components in any insertion order are equal, hash identically, and
//! produce identical [`serialize_key`](descriptor::AspectDescriptor::serialize_key)
//! bytes — the encoding is version-stamped and order-independent, suitable
//! for persistence across processes or distribution across machines.
//!
//! # Concurrency
//!
//! Many independent `(descriptor, node)` applications proceed in parallel;
//! the only shared mutable state is the native-class registry and the two
//! memo caches, all concurrent maps with single-flight join semantics
//! ([`flight::MemoCache`]). Dynamic definition loading and delegated
//! evaluation are the two suspension points; neither holds a worker thread.
//! Cancelling a pass aborts in-flight work without invalidating entries
//! already committed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aspect_engine::class::AspectRegistry;
//! use aspect_engine::definition::{AspectDefinition, ProviderPredicate};
//! use aspect_engine::engine::{DeclaredAspect, DependencyEdge, EdgeRequest, PropagationContext, PropagationEngine};
//! use aspect_engine::core::ConfigurationId;
//! use aspect_engine::provider::ProviderMap;
//! use aspect_engine::resolver::AspectResolver;
//!
//! # async fn example(
//! #     loader: Arc<dyn aspect_engine::resolver::SymbolLoader>,
//! #     evaluator: Arc<dyn aspect_engine::engine::Evaluator>,
//! # ) -> anyhow::Result<()> {
//! let registry = Arc::new(AspectRegistry::new());
//! let checker = registry.register(
//!     "checker",
//!     AspectDefinition::new(
//!         ProviderPredicate::require_all(["X".into()]),
//!         [],
//!         ["Y".into()],
//!     ),
//! )?;
//!
//! let resolver = Arc::new(AspectResolver::new(registry, loader));
//! let engine = PropagationEngine::new(resolver, evaluator);
//!
//! let request = EdgeRequest {
//!     edge: DependencyEdge::new("//pkg:src", "deps", "//pkg:dep"),
//!     declared: vec![DeclaredAspect::of(checker)],
//!     applied_on_source: Vec::new(),
//!     target_providers: ProviderMap::new(),
//!     configuration: ConfigurationId::new("host"),
//! };
//! let outcome = engine.propagate(&request, &PropagationContext::root()).await;
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod class;
pub mod core;
pub mod definition;
pub mod descriptor;
pub mod engine;
pub mod flight;
pub mod params;
pub mod provider;
pub mod resolver;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::class::{AspectClass, AspectRegistry, SourceLocation};
pub use crate::core::{AspectError, ConfigurationId, Diagnostic, NodeId, Result};
pub use crate::definition::{Aspect, AspectDefinition, ProviderPredicate};
pub use crate::descriptor::AspectDescriptor;
pub use crate::engine::{
    ApplicationStatus, ConfiguredAspect, DeclaredAspect, DependencyEdge, EdgeOutcome, EdgeRequest,
    Evaluator, PassReport, PropagationContext, PropagationEngine,
};
pub use crate::params::AspectParameters;
pub use crate::provider::{MergeBuilder, ProviderId, ProviderMap, ProviderValue};
pub use crate::resolver::{AspectResolver, LoadContext, RawDefinition, SymbolLoader};
