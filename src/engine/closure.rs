//! Propagation-closure computation.
//!
//! Given the descriptors declared on an attribute and the aspects already
//! applied on the source node, compute the full set of descriptors to apply
//! across the edge. The walk is an explicit worklist with a seen set, not
//! call-stack recursion, so mutually-inheriting attribute-aspect references
//! terminate and depth is bounded independently of the host stack.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::definition::Aspect;
use crate::descriptor::AspectDescriptor;
use crate::params::AspectParameters;

/// Compute the propagation closure for one edge.
///
/// Base items, in order: the attribute's declared descriptors, then the
/// descriptor of every already-applied aspect whose definition lists
/// `attribute` among its propagation attributes (the aspect rides the edge
/// down). Expansion: each closure descriptor contributes, for every class in
/// its inherited attribute-aspect set, a child descriptor with empty
/// parameters inheriting the parent's required-provider and attribute-aspect
/// sets. Iterated to fixpoint.
///
/// Output order is deterministic: discovery order, with children in the
/// canonical order of their parent's attribute-aspect set.
pub(crate) fn propagation_closure(
    attribute: &str,
    declared: &[AspectDescriptor],
    applied_on_source: &[Arc<Aspect>],
) -> Vec<AspectDescriptor> {
    let mut queue: VecDeque<AspectDescriptor> = declared.iter().cloned().collect();
    for aspect in applied_on_source {
        if aspect.definition().propagates_along(attribute) {
            queue.push_back(aspect.descriptor().clone());
        }
    }

    let mut seen: HashSet<AspectDescriptor> = HashSet::new();
    let mut closure = Vec::new();
    while let Some(descriptor) = queue.pop_front() {
        if !seen.insert(descriptor.clone()) {
            continue;
        }
        for class in descriptor.attribute_aspects() {
            queue.push_back(AspectDescriptor::with_inherited(
                class.clone(),
                AspectParameters::empty(),
                descriptor.required_providers().iter().cloned(),
                descriptor.attribute_aspects().iter().cloned(),
            ));
        }
        closure.push(descriptor);
    }
    closure
}
