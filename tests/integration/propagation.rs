//! End-to-end propagation: closure, applicability, evaluation, merge.

use crate::common::{Stack, definition, provider_map, raw_definition};
use aspect_engine::class::AspectClass;
use aspect_engine::core::{ConfigurationId, NodeId};
use aspect_engine::definition::Aspect;
use aspect_engine::descriptor::AspectDescriptor;
use aspect_engine::engine::{
    ApplicationStatus, DeclaredAspect, DependencyEdge, EdgeRequest, PropagationContext,
};
use aspect_engine::params::AspectParameters;
use aspect_engine::provider::ProviderId;
use serde_json::json;
use std::sync::Arc;

fn request(stack_edge: DependencyEdge, declared: Vec<DeclaredAspect>) -> EdgeRequest {
    EdgeRequest {
        edge: stack_edge,
        declared,
        applied_on_source: Vec::new(),
        target_providers: provider_map(&[]),
        configuration: ConfigurationId::new("cfg"),
    }
}

// Spec scenario: aspect A (mode=fast) requiring X, applied to node N with
// native providers {X}, produces Y. Merged result: {X, Y}.
#[tokio::test]
async fn requiring_aspect_applies_and_augments() {
    let stack = Stack::new();
    let class = stack.registry.register("A", definition(&["X"], &[], &["Y"])).unwrap();
    let params = AspectParameters::builder().put("mode", ["fast"]).build();

    let mut req = request(
        DependencyEdge::new("//pkg:requester", "deps", "//pkg:n"),
        vec![DeclaredAspect::new(class, params)],
    );
    req.target_providers = provider_map(&[("X", json!("native-x"))]);

    let outcome = stack.engine.propagate(&req, &PropagationContext::root()).await;
    assert!(outcome.is_clean());
    let merged = outcome.merged.unwrap();
    assert_eq!(
        merged.ids().map(ProviderId::as_str).collect::<Vec<_>>(),
        vec!["X", "Y"]
    );
    // The native value is untouched.
    assert_eq!(merged.get(&"X".into()), Some(&json!("native-x")));
}

// Spec scenario: the same A applied to node M with native providers {Z}
// (missing X). Merged result: {Z}, unchanged, no error.
#[tokio::test]
async fn requiring_aspect_skips_node_without_provider() {
    let stack = Stack::new();
    let class = stack.registry.register("A", definition(&["X"], &[], &["Y"])).unwrap();
    let params = AspectParameters::builder().put("mode", ["fast"]).build();

    let mut req = request(
        DependencyEdge::new("//pkg:requester", "deps", "//pkg:m"),
        vec![DeclaredAspect::new(class, params)],
    );
    req.target_providers = provider_map(&[("Z", json!("native-z"))]);

    let outcome = stack.engine.propagate(&req, &PropagationContext::root()).await;
    assert!(outcome.is_clean());
    let merged = outcome.merged.unwrap();
    assert_eq!(merged.ids().map(ProviderId::as_str).collect::<Vec<_>>(), vec!["Z"]);
    assert_eq!(outcome.applications[0].status, ApplicationStatus::SkippedRequirements);
}

#[tokio::test]
async fn applied_aspect_propagates_through_listed_attribute() {
    let stack = Stack::new();
    // The source node already carries "carrier", which re-propagates along
    // "deps" and drags the dynamic "lint" aspect with it.
    stack.loader.provide("//tools:lint.defs", "lint", raw_definition(&[], &[], &["Lint"]));
    let carrier_descriptor = AspectDescriptor::with_inherited(
        AspectClass::native("carrier"),
        AspectParameters::empty(),
        [],
        [AspectClass::dynamic("//tools:lint.defs", "lint")],
    );
    let carrier_definition = definition(&[], &["deps"], &["Carried"]);
    stack.registry.register("carrier", carrier_definition.clone()).unwrap();

    let mut req = request(DependencyEdge::new("//pkg:src", "deps", "//pkg:n"), Vec::new());
    req.applied_on_source =
        vec![Arc::new(Aspect::new(carrier_descriptor, Arc::new(carrier_definition)))];
    req.target_providers = provider_map(&[("X", json!(1))]);

    let outcome = stack.engine.propagate(&req, &PropagationContext::root()).await;
    assert!(outcome.is_clean());
    let merged = outcome.merged.unwrap();
    assert!(merged.contains(&"Carried".into()));
    assert!(merged.contains(&"Lint".into()));
    assert_eq!(stack.loader.load_count(), 1);
}

#[tokio::test]
async fn applied_aspect_ignores_unlisted_attribute() {
    let stack = Stack::new();
    let carrier_definition = definition(&[], &["runtime_deps"], &["Carried"]);
    stack.registry.register("carrier", carrier_definition.clone()).unwrap();
    let carrier = Arc::new(Aspect::new(
        AspectDescriptor::new(AspectClass::native("carrier"), AspectParameters::empty()),
        Arc::new(carrier_definition),
    ));

    let mut req = request(DependencyEdge::new("//pkg:src", "deps", "//pkg:n"), Vec::new());
    req.applied_on_source = vec![carrier];
    req.target_providers = provider_map(&[("X", json!(1))]);

    let outcome = stack.engine.propagate(&req, &PropagationContext::root()).await;
    assert!(outcome.applications.is_empty());
    assert_eq!(outcome.merged.unwrap().len(), 1);
}

#[tokio::test]
async fn cyclic_attribute_aspects_terminate() {
    let stack = Stack::new();
    // a inherits b, b inherits a.
    stack.registry.register("a", definition(&[], &["deps"], &["PA"])).unwrap();
    stack.registry.register("b", definition(&[], &["deps"], &["PB"])).unwrap();

    let a = AspectDescriptor::with_inherited(
        AspectClass::native("a"),
        AspectParameters::empty(),
        [],
        [AspectClass::native("b")],
    );
    let b = AspectDescriptor::with_inherited(
        AspectClass::native("b"),
        AspectParameters::empty(),
        [],
        [AspectClass::native("a")],
    );

    let mut req = request(DependencyEdge::new("//pkg:src", "deps", "//pkg:n"), Vec::new());
    req.applied_on_source = vec![
        Arc::new(Aspect::new(a, Arc::new(definition(&[], &["deps"], &["PA"])))),
        Arc::new(Aspect::new(b, Arc::new(definition(&[], &["deps"], &["PB"])))),
    ];
    req.target_providers = provider_map(&[("X", json!(1))]);

    let outcome = stack.engine.propagate(&req, &PropagationContext::root()).await;
    // Terminates with a bounded closure; only full descriptors are
    // deduplicated, so the same class may appear with different inherited
    // sets, but never twice with the same ones.
    let total = outcome.applications.len();
    assert!(total <= 6);
    let distinct = outcome
        .applications
        .iter()
        .map(|a| format!("{:?}", a.descriptor))
        .collect::<std::collections::HashSet<_>>()
        .len();
    assert_eq!(distinct, total);
}

#[tokio::test]
async fn augmented_view_reaches_nested_requesters_unchanged() {
    let stack = Stack::new();
    let class = stack.registry.register("A", definition(&[], &[], &["Y"])).unwrap();
    let descriptor = AspectDescriptor::new(class.clone(), AspectParameters::empty());
    let node = NodeId::new("//pkg:n");

    // A nested propagation path that already carries this application skips
    // it instead of re-expanding.
    let ctx = PropagationContext::root().with_active(descriptor, node);
    let mut req = request(
        DependencyEdge::new("//pkg:src", "deps", "//pkg:n"),
        vec![DeclaredAspect::of(class)],
    );
    req.target_providers = provider_map(&[("X", json!(1))]);

    let outcome = stack.engine.propagate(&req, &ctx).await;
    assert_eq!(outcome.applications[0].status, ApplicationStatus::SkippedActive);
    assert_eq!(outcome.merged.unwrap().ids().count(), 1);
}
