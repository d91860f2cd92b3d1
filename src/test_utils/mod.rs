//! Stub collaborators and small builders for tests.
//!
//! Available to unit tests and, behind the `test-utils` feature, to
//! dependent crates' test suites.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::class::SourceLocation;
use crate::core::{ConfigurationId, NodeId};
use crate::definition::Aspect;
use crate::descriptor::AspectDescriptor;
use crate::engine::{Evaluator, PropagationContext};
use crate::provider::{ProviderId, ProviderMap, ProviderValue};
use crate::resolver::{LoadContext, RawDefinition, SymbolLoader};

/// Scripted symbol loader that counts invocations.
///
/// Verifies memoization and single-flight properties: the count tells how
/// many loads actually ran, an optional delay widens race windows.
#[derive(Debug, Default)]
pub struct CountingLoader {
    definitions: DashMap<(SourceLocation, String), RawDefinition>,
    loads: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that sleeps for `delay` inside every load.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    /// Script the definition returned for a `(location, symbol)` pair.
    pub fn provide(
        &self,
        location: impl Into<SourceLocation>,
        symbol: impl Into<String>,
        raw: RawDefinition,
    ) {
        self.definitions.insert((location.into(), symbol.into()), raw);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SymbolLoader for CountingLoader {
    async fn load(
        &self,
        location: &SourceLocation,
        symbol: &str,
        _ctx: &LoadContext,
    ) -> anyhow::Result<RawDefinition> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.definitions
            .get(&(location.clone(), symbol.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("symbol '{symbol}' not found in {location}"))
    }
}

/// Scripted evaluation delegate that counts invocations.
///
/// Unscripted `(descriptor, node)` pairs fall back to producing every
/// provider the aspect's definition advertises, with a value naming the
/// producing aspect — so two distinct aspects advertising the same provider
/// conflict by default, which is what most merge tests want.
#[derive(Debug, Default)]
pub struct StaticEvaluator {
    outputs: DashMap<(AspectDescriptor, NodeId), ProviderMap>,
    failures: DashMap<(AspectDescriptor, NodeId), String>,
    evaluations: AtomicUsize,
    delay: Option<Duration>,
}

impl StaticEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    /// Script the provider output for one `(descriptor, node)` application.
    pub fn provide(&self, descriptor: AspectDescriptor, node: NodeId, providers: ProviderMap) {
        self.outputs.insert((descriptor, node), providers);
    }

    /// Script a failure for one `(descriptor, node)` application.
    pub fn fail(&self, descriptor: AspectDescriptor, node: NodeId, reason: impl Into<String>) {
        self.failures.insert((descriptor, node), reason.into());
    }

    pub fn eval_count(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for StaticEvaluator {
    async fn evaluate(
        &self,
        aspect: &Aspect,
        node: &NodeId,
        _configuration: &ConfigurationId,
        _node_providers: &ProviderMap,
        _ctx: &PropagationContext,
    ) -> anyhow::Result<ProviderMap> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let key = (aspect.descriptor().clone(), node.clone());
        if let Some(reason) = self.failures.get(&key) {
            anyhow::bail!("{}", reason.value());
        }
        if let Some(scripted) = self.outputs.get(&key) {
            return Ok(scripted.value().clone());
        }
        Ok(aspect
            .definition()
            .advertised_providers
            .iter()
            .map(|id| (id.clone(), produced_by(id, aspect)))
            .collect())
    }
}

fn produced_by(id: &ProviderId, aspect: &Aspect) -> ProviderValue {
    json!(format!("{id} produced by {aspect}"))
}

/// Wrap loose `(id, value)` pairs into a provider map.
pub fn provider_map(pairs: &[(&str, ProviderValue)]) -> ProviderMap {
    pairs.iter().map(|(id, value)| (ProviderId::from(*id), value.clone())).collect()
}

/// Compiled definition requiring all of `requires`, propagating along
/// `attributes`, advertising `advertises`.
pub fn definition(
    requires: &[&str],
    attributes: &[&str],
    advertises: &[&str],
) -> crate::definition::AspectDefinition {
    let predicate = if requires.is_empty() {
        crate::definition::ProviderPredicate::accept_all()
    } else {
        crate::definition::ProviderPredicate::require_all(
            requires.iter().map(|id| ProviderId::from(*id)),
        )
    };
    crate::definition::AspectDefinition::new(
        predicate,
        attributes.iter().map(|a| a.to_string()),
        advertises.iter().map(|id| ProviderId::from(*id)),
    )
}

/// Raw definition requiring all of `requires`, propagating along
/// `attributes`, advertising `advertises`.
pub fn raw_definition(requires: &[&str], attributes: &[&str], advertises: &[&str]) -> RawDefinition {
    RawDefinition {
        required_providers: if requires.is_empty() {
            Vec::new()
        } else {
            vec![requires.iter().map(|id| ProviderId::from(*id)).collect()]
        },
        propagate_along: attributes.iter().map(|a| a.to_string()).collect(),
        advertised_providers: advertises.iter().map(|id| ProviderId::from(*id)).collect(),
    }
}

/// Shared handle bundle for engine tests.
pub struct TestHarness {
    pub registry: Arc<crate::class::AspectRegistry>,
    pub loader: Arc<CountingLoader>,
    pub evaluator: Arc<StaticEvaluator>,
    pub resolver: Arc<crate::resolver::AspectResolver>,
    pub engine: crate::engine::PropagationEngine,
}

impl TestHarness {
    pub fn new() -> Self {
        let registry = Arc::new(crate::class::AspectRegistry::new());
        let loader = Arc::new(CountingLoader::new());
        let evaluator = Arc::new(StaticEvaluator::new());
        let resolver =
            Arc::new(crate::resolver::AspectResolver::new(registry.clone(), loader.clone()));
        let engine =
            crate::engine::PropagationEngine::new(resolver.clone(), evaluator.clone());
        Self { registry, loader, evaluator, resolver, engine }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
