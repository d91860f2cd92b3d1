//! The propagation engine.
//!
//! For a dependency edge `(source node, attribute, dependency node)` the
//! engine:
//!
//! 1. computes the propagation closure of aspect descriptors (declared on
//!    the attribute plus those inherited from the source node's
//!    already-applied aspects, transitively),
//! 2. resolves each descriptor to a shared [`Aspect`] (may suspend on a
//!    dynamic load),
//! 3. drops aspects whose required-provider predicate the dependency node's
//!    own providers do not satisfy — silently, never as an error,
//! 4. delegates evaluation of the rest to the external [`Evaluator`], cached
//!    single-flight per `(descriptor, node, configuration)`,
//! 5. merges every configured aspect's providers with the node's native
//!    providers into the augmented view the requester observes.
//!
//! # Failure scoping
//!
//! A load or evaluation failure aborts only the `(node, attribute, aspect)`
//! application that triggered it and becomes a [`Diagnostic`]; the rest of
//! the edge still merges. A provider conflict withholds the merged view for
//! that edge only. [`PropagationEngine::run_pass`] keeps evaluating
//! independent edges and surfaces the complete diagnostic set.
//!
//! # Per-application state machine
//!
//! ```text
//! Requested → DescriptorComputed → DefinitionLoading → DefinitionReady
//!           → RequirementsChecked{Skipped | Applicable}
//!           → Evaluating → {Merged | ConflictError | LoadError | CyclicLoadError}
//! ```
//!
//! Terminal states map onto [`ApplicationStatus`]; the suspending states are
//! the resolver's loader call and the evaluator call.

mod closure;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::class::AspectClass;
use crate::core::{AspectError, ConfigurationId, Diagnostic, NodeId};
use crate::definition::Aspect;
use crate::descriptor::AspectDescriptor;
use crate::flight::MemoCache;
use crate::params::AspectParameters;
use crate::provider::{MergeBuilder, ProviderMap};
use crate::resolver::{AspectResolver, LoadContext};

/// One `(class, parameters)` pair declared on an attribute by the
/// rule/target definition loader. Consumed read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredAspect {
    pub class: AspectClass,
    pub parameters: AspectParameters,
}

impl DeclaredAspect {
    pub fn new(class: AspectClass, parameters: AspectParameters) -> Self {
        Self { class, parameters }
    }

    /// Declaration without parameters.
    pub fn of(class: AspectClass) -> Self {
        Self::new(class, AspectParameters::empty())
    }

    fn descriptor(&self) -> AspectDescriptor {
        AspectDescriptor::new(self.class.clone(), self.parameters.clone())
    }
}

/// A dependency edge under propagation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub source: NodeId,
    pub attribute: String,
    pub target: NodeId,
}

impl DependencyEdge {
    pub fn new(
        source: impl Into<NodeId>,
        attribute: impl Into<String>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self { source: source.into(), attribute: attribute.into(), target: target.into() }
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.attribute, self.target)
    }
}

/// The provider-set result of evaluating one aspect against one node under
/// one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredAspect {
    pub descriptor: AspectDescriptor,
    pub providers: ProviderMap,
}

/// Memo key for configured-aspect evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EvalKey {
    descriptor: AspectDescriptor,
    node: NodeId,
    configuration: ConfigurationId,
}

/// External evaluation delegate: computes an aspect's body against one node.
///
/// The sole suspension point of propagation step 4. Implementations that
/// recursively propagate deeper edges must pass `ctx` into the nested
/// [`PropagationEngine::propagate`] call so active applications are not
/// re-expanded.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        aspect: &Aspect,
        node: &NodeId,
        configuration: &ConfigurationId,
        node_providers: &ProviderMap,
        ctx: &PropagationContext,
    ) -> anyhow::Result<ProviderMap>;
}

/// State threaded along one propagation path: the active
/// `(descriptor, node)` applications and the dynamic-load in-progress set.
///
/// Cloned-and-extended down the path, never shared mutable state, so
/// unrelated paths cannot observe each other's guards.
#[derive(Debug, Clone, Default)]
pub struct PropagationContext {
    active: HashSet<(AspectDescriptor, NodeId)>,
    load: LoadContext,
}

impl PropagationContext {
    /// Context for a fresh propagation path.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn load(&self) -> &LoadContext {
        &self.load
    }

    /// True when the `(descriptor, node)` application is already active on
    /// this path.
    pub fn is_active(&self, descriptor: &AspectDescriptor, node: &NodeId) -> bool {
        self.active.contains(&(descriptor.clone(), node.clone()))
    }

    /// Child context with one more active application.
    pub fn with_active(&self, descriptor: AspectDescriptor, node: NodeId) -> Self {
        let mut child = self.clone();
        child.active.insert((descriptor, node));
        child
    }
}

/// Everything the engine needs to propagate one edge.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub edge: DependencyEdge,
    /// Aspects declared on the attribute, in declaration order.
    pub declared: Vec<DeclaredAspect>,
    /// Aspects already applied on the source node.
    pub applied_on_source: Vec<Arc<Aspect>>,
    /// The dependency node's own provider set.
    pub target_providers: ProviderMap,
    pub configuration: ConfigurationId,
}

/// Terminal state of one `(descriptor, node)` application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    /// Evaluated and merged into the augmented view.
    Merged,
    /// Required-provider predicate unmet; silent no-op.
    SkippedRequirements,
    /// The identical application was already active on this path; not
    /// re-expanded.
    SkippedActive,
    /// Load, evaluation, or merge failure; see the edge diagnostics.
    Failed,
}

/// Report for one application within an edge.
#[derive(Debug, Clone)]
pub struct ApplicationReport {
    pub descriptor: AspectDescriptor,
    pub status: ApplicationStatus,
}

/// Result of propagating one edge.
#[derive(Debug, Clone)]
pub struct EdgeOutcome {
    pub edge: DependencyEdge,
    /// The augmented provider view: the target's native providers plus every
    /// merged aspect's providers. `None` when a provider conflict withheld
    /// the merge for this edge.
    pub merged: Option<ProviderMap>,
    pub applications: Vec<ApplicationReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl EdgeOutcome {
    /// True when a merged view exists and no application failed.
    pub fn is_clean(&self) -> bool {
        self.merged.is_some() && self.diagnostics.is_empty()
    }
}

/// Accumulated result of one evaluation pass over many edges.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub outcomes: Vec<EdgeOutcome>,
}

impl PassReport {
    /// Every diagnostic gathered across the pass.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.outcomes.iter().flat_map(|outcome| outcome.diagnostics.iter())
    }

    pub fn has_failures(&self) -> bool {
        self.diagnostics().next().is_some()
    }

    pub fn outcome_for(&self, target: &NodeId) -> Option<&EdgeOutcome> {
        self.outcomes.iter().find(|outcome| &outcome.edge.target == target)
    }
}

/// Walks dependency edges, applies aspects, and merges their outputs.
pub struct PropagationEngine {
    resolver: Arc<AspectResolver>,
    evaluator: Arc<dyn Evaluator>,
    configured: MemoCache<EvalKey, ConfiguredAspect>,
    max_concurrency: usize,
}

/// Result of one application before the merge phase.
struct Applied {
    report: ApplicationReport,
    configured: Option<Arc<ConfiguredAspect>>,
    diagnostic: Option<Diagnostic>,
}

impl PropagationEngine {
    /// Engine with default concurrency: max(10, 2 × CPU cores).
    pub fn new(resolver: Arc<AspectResolver>, evaluator: Arc<dyn Evaluator>) -> Self {
        let cores = std::thread::available_parallelism().map(std::num::NonZero::get).unwrap_or(4);
        Self::with_concurrency(resolver, evaluator, std::cmp::max(10, cores * 2))
    }

    pub fn with_concurrency(
        resolver: Arc<AspectResolver>,
        evaluator: Arc<dyn Evaluator>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            evaluator,
            configured: MemoCache::new(),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn resolver(&self) -> &Arc<AspectResolver> {
        &self.resolver
    }

    /// Propagate one dependency edge and return the augmented view.
    pub async fn propagate(&self, request: &EdgeRequest, ctx: &PropagationContext) -> EdgeOutcome {
        let edge = &request.edge;
        let declared: Vec<AspectDescriptor> =
            request.declared.iter().map(DeclaredAspect::descriptor).collect();
        let closure = closure::propagation_closure(
            &edge.attribute,
            &declared,
            &request.applied_on_source,
        );
        tracing::debug!(
            target: "aspect::engine",
            "propagating {edge}: closure of {} aspect(s)",
            closure.len()
        );

        let applied: Vec<Applied> = stream::iter(
            closure.iter().map(|descriptor| self.apply_one(descriptor, request, ctx)),
        )
        .buffered(self.max_concurrency)
        .collect()
        .await;

        let mut applications = Vec::with_capacity(applied.len());
        let mut diagnostics = Vec::new();
        let mut builder = MergeBuilder::new();
        let mut conflicted = false;
        // The first absorb into an empty builder cannot conflict.
        if let Err(err) =
            builder.absorb(&format!("native providers of {}", edge.target), &request.target_providers)
        {
            diagnostics.push(Diagnostic {
                node: edge.target.clone(),
                attribute: edge.attribute.clone(),
                aspect: "<native providers>".to_string(),
                error: err,
            });
            conflicted = true;
        }
        for item in applied {
            let mut report = item.report;
            if let Some(diagnostic) = item.diagnostic {
                diagnostics.push(diagnostic);
            }
            if let Some(configured) = item.configured {
                if !conflicted {
                    let label = report.descriptor.to_string();
                    if let Err(err) = builder.absorb(&label, &configured.providers) {
                        tracing::warn!(
                            target: "aspect::engine",
                            "merge conflict on {edge}: {err}"
                        );
                        diagnostics.push(Diagnostic {
                            node: edge.target.clone(),
                            attribute: edge.attribute.clone(),
                            aspect: label,
                            error: err,
                        });
                        report.status = ApplicationStatus::Failed;
                        conflicted = true;
                    }
                }
            }
            applications.push(report);
        }

        let merged = if conflicted { None } else { Some(builder.finish()) };
        EdgeOutcome { edge: edge.clone(), merged, applications, diagnostics }
    }

    /// Propagate many independent edges concurrently, accumulating every
    /// diagnostic instead of failing fast.
    pub async fn run_pass(&self, requests: Vec<EdgeRequest>) -> PassReport {
        let outcomes = stream::iter(requests.into_iter().map(|request| async move {
            let ctx = PropagationContext::root();
            self.propagate(&request, &ctx).await
        }))
        .buffered(self.max_concurrency)
        .collect()
        .await;
        PassReport { outcomes }
    }

    /// Resolve, filter, and evaluate one closure descriptor.
    async fn apply_one(
        &self,
        descriptor: &AspectDescriptor,
        request: &EdgeRequest,
        ctx: &PropagationContext,
    ) -> Applied {
        let node = &request.edge.target;
        if ctx.is_active(descriptor, node) {
            tracing::trace!(
                target: "aspect::engine",
                "skipping already-active application of {descriptor} on {node}"
            );
            return Applied {
                report: ApplicationReport {
                    descriptor: descriptor.clone(),
                    status: ApplicationStatus::SkippedActive,
                },
                configured: None,
                diagnostic: None,
            };
        }

        let aspect = match self.resolver.resolve_aspect(descriptor, ctx.load()).await {
            Ok(aspect) => aspect,
            Err(error) => {
                return Applied {
                    report: ApplicationReport {
                        descriptor: descriptor.clone(),
                        status: ApplicationStatus::Failed,
                    },
                    configured: None,
                    diagnostic: Some(Diagnostic {
                        node: node.clone(),
                        attribute: request.edge.attribute.clone(),
                        aspect: descriptor.to_string(),
                        error,
                    }),
                };
            }
        };

        let applicable = aspect
            .definition()
            .required_providers
            .satisfied_by(&request.target_providers)
            && request.target_providers.contains_all(descriptor.required_providers());
        if !applicable {
            tracing::trace!(
                target: "aspect::engine",
                "requirements of {descriptor} unmet on {node}, skipping"
            );
            return Applied {
                report: ApplicationReport {
                    descriptor: descriptor.clone(),
                    status: ApplicationStatus::SkippedRequirements,
                },
                configured: None,
                diagnostic: None,
            };
        }

        let key = EvalKey {
            descriptor: descriptor.clone(),
            node: node.clone(),
            configuration: request.configuration.clone(),
        };
        let child = ctx.with_active(descriptor.clone(), node.clone());
        let configured = self
            .configured
            .get_or_compute(key, || async {
                let providers = self
                    .evaluator
                    .evaluate(
                        &aspect,
                        node,
                        &request.configuration,
                        &request.target_providers,
                        &child,
                    )
                    .await
                    .map_err(|err| wrap_evaluation_error(descriptor, node, err))?;
                Ok(ConfiguredAspect { descriptor: descriptor.clone(), providers })
            })
            .await;

        match configured {
            Ok(configured) => Applied {
                report: ApplicationReport {
                    descriptor: descriptor.clone(),
                    status: ApplicationStatus::Merged,
                },
                configured: Some(configured),
                diagnostic: None,
            },
            Err(error) => Applied {
                report: ApplicationReport {
                    descriptor: descriptor.clone(),
                    status: ApplicationStatus::Failed,
                },
                configured: None,
                diagnostic: Some(Diagnostic {
                    node: node.clone(),
                    attribute: request.edge.attribute.clone(),
                    aspect: descriptor.to_string(),
                    error,
                }),
            },
        }
    }
}

/// Wrap an evaluator failure, letting a typed `AspectError` surfaced from
/// nested propagation pass through unchanged.
fn wrap_evaluation_error(
    descriptor: &AspectDescriptor,
    node: &NodeId,
    err: anyhow::Error,
) -> AspectError {
    match err.downcast::<AspectError>() {
        Ok(aspect_err) => aspect_err,
        Err(other) => AspectError::Evaluation {
            aspect: descriptor.to_string(),
            node: node.to_string(),
            reason: format!("{other:#}"),
        },
    }
}
