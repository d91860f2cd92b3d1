//! Partial-failure semantics: diagnostics accumulate, independent work
//! completes.

use crate::common::{Stack, definition, provider_map};
use aspect_engine::class::AspectClass;
use aspect_engine::core::{ConfigurationId, NodeId};
use aspect_engine::engine::{DeclaredAspect, DependencyEdge, EdgeRequest, PropagationContext};
use aspect_engine::provider::ProviderId;
use serde_json::json;

fn edge(source: &str, target: &str, declared: Vec<DeclaredAspect>) -> EdgeRequest {
    EdgeRequest {
        edge: DependencyEdge::new(source, "deps", target),
        declared,
        applied_on_source: Vec::new(),
        target_providers: provider_map(&[("X", json!(1))]),
        configuration: ConfigurationId::new("cfg"),
    }
}

// Spec scenario: aspects A and B both produce Y with differing values on
// node N; the merge fails, while unrelated node P completes in the same
// pass.
#[tokio::test]
async fn conflict_on_one_node_spares_the_rest_of_the_pass() {
    let stack = Stack::new();
    let a = stack.registry.register("A", definition(&[], &[], &["Y"])).unwrap();
    let b = stack.registry.register("B", definition(&[], &[], &["Y"])).unwrap();

    let report = stack
        .engine
        .run_pass(vec![
            edge("//pkg:src", "//pkg:n", vec![DeclaredAspect::of(a.clone()), DeclaredAspect::of(b)]),
            edge("//pkg:src", "//pkg:p", vec![DeclaredAspect::of(a)]),
        ])
        .await;

    let failed = report.outcome_for(&NodeId::new("//pkg:n")).unwrap();
    assert!(failed.merged.is_none());
    assert_eq!(failed.diagnostics.len(), 1);
    assert_eq!(failed.diagnostics[0].error.kind(), "provider-conflict");
    assert_eq!(failed.diagnostics[0].attribute, "deps");

    let healthy = report.outcome_for(&NodeId::new("//pkg:p")).unwrap();
    assert!(healthy.is_clean());
    assert!(healthy.merged.as_ref().unwrap().contains(&ProviderId::from("Y")));

    // The pass surfaces the complete diagnostic set.
    assert_eq!(report.diagnostics().count(), 1);
}

#[tokio::test]
async fn load_failure_is_attached_to_its_triple() {
    let stack = Stack::new();
    let ok = stack.registry.register("ok", definition(&[], &[], &["OK"])).unwrap();
    let missing = AspectClass::dynamic("//tools:gone.defs", "gone");

    let report = stack
        .engine
        .run_pass(vec![edge(
            "//pkg:src",
            "//pkg:n",
            vec![DeclaredAspect::of(missing), DeclaredAspect::of(ok)],
        )])
        .await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.diagnostics.len(), 1);
    let diagnostic = &outcome.diagnostics[0];
    assert_eq!(diagnostic.error.kind(), "load");
    assert_eq!(diagnostic.node, NodeId::new("//pkg:n"));
    assert_eq!(diagnostic.attribute, "deps");
    assert!(diagnostic.aspect.contains("gone"));

    // The healthy aspect on the same edge still merged.
    let merged = outcome.merged.as_ref().unwrap();
    assert!(merged.contains(&ProviderId::from("OK")));
}

#[tokio::test]
async fn failing_and_healthy_edges_report_side_by_side() {
    let stack = Stack::new();
    let ok = stack.registry.register("ok", definition(&[], &[], &["OK"])).unwrap();
    let broken = AspectClass::dynamic("//tools:gone.defs", "gone");

    let report = stack
        .engine
        .run_pass(vec![
            edge("//pkg:src", "//pkg:broken", vec![DeclaredAspect::of(broken)]),
            edge("//pkg:src", "//pkg:ok", vec![DeclaredAspect::of(ok)]),
        ])
        .await;

    assert!(report.has_failures());
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcome_for(&NodeId::new("//pkg:ok")).unwrap().is_clean());
    // Even the failing edge retains its native view; only the offending
    // application was dropped.
    let broken_outcome = report.outcome_for(&NodeId::new("//pkg:broken")).unwrap();
    assert!(broken_outcome.merged.is_some());
    assert!(!broken_outcome.is_clean());
}

#[tokio::test]
async fn diagnostics_render_the_full_triple() {
    let stack = Stack::new();
    let missing = AspectClass::dynamic("//tools:gone.defs", "gone");
    let outcome = stack
        .engine
        .propagate(
            &edge("//pkg:src", "//pkg:n", vec![DeclaredAspect::of(missing)]),
            &PropagationContext::root(),
        )
        .await;

    let rendered = outcome.diagnostics[0].to_string();
    assert!(rendered.contains("//pkg:n"));
    assert!(rendered.contains("deps"));
    assert!(rendered.contains("//tools:gone.defs%gone"));
}
