//! Error handling for the aspect engine.
//!
//! The error system follows two rules set by the propagation policy:
//!
//! 1. **Typed, scoped errors**: every failure mode is a distinct
//!    [`AspectError`] variant carrying enough context to identify the
//!    `(node, attribute, aspect)` application that triggered it.
//! 2. **Skip is not an error**: an aspect whose required-provider predicate a
//!    node does not satisfy is silently skipped. There is no variant for it
//!    and none should be added.
//!
//! Errors scoped to one aspect application (`Load`, `CyclicLoad`,
//! `Evaluation`) or to one node's merge (`ProviderConflict`) are carried as
//! [`Diagnostic`] records rather than aborting the pass, so independent parts
//! of the graph keep evaluating and the requester receives the complete
//! diagnostic set.

use std::fmt;
use thiserror::Error;

use crate::class::SourceLocation;
use crate::core::NodeId;
use crate::provider::ProviderId;

/// Result alias used throughout the crate.
pub type Result<T, E = AspectError> = std::result::Result<T, E>;

/// All failure modes of the aspect engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AspectError {
    /// A native aspect class with this name is already registered.
    #[error("aspect class '{name}' is already registered")]
    DuplicateName { name: String },

    /// No native aspect class with this name exists in the registry.
    #[error("no native aspect class named '{name}' is registered")]
    NotFound { name: String },

    /// Malformed input while building aspect parameters.
    #[error("invalid aspect parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Loading a dynamic aspect definition failed: missing source unit,
    /// absent symbol, or a symbol whose shape is not aspect-like.
    #[error("failed to load aspect '{symbol}' from {location}: {reason}")]
    Load {
        location: SourceLocation,
        symbol: String,
        reason: String,
    },

    /// Resolving a definition would require the load already in progress on
    /// the current path. Detected via an explicit in-progress set, never by
    /// stack depth.
    #[error("cyclic load while resolving '{symbol}' from {location}")]
    CyclicLoad {
        location: SourceLocation,
        symbol: String,
    },

    /// Two sources exported the same provider identity with differing values
    /// while merging onto one node.
    #[error("provider '{provider}' exported with conflicting values by {first} and {second}")]
    ProviderConflict {
        provider: ProviderId,
        first: String,
        second: String,
    },

    /// The external evaluation delegate failed for one aspect application.
    #[error("evaluation of aspect '{aspect}' on node '{node}' failed: {reason}")]
    Evaluation {
        aspect: String,
        node: String,
        reason: String,
    },
}

impl AspectError {
    /// Short stable name of the error kind, for log fields and assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateName { .. } => "duplicate-name",
            Self::NotFound { .. } => "not-found",
            Self::InvalidParameter { .. } => "invalid-parameter",
            Self::Load { .. } => "load",
            Self::CyclicLoad { .. } => "cyclic-load",
            Self::ProviderConflict { .. } => "provider-conflict",
            Self::Evaluation { .. } => "evaluation",
        }
    }
}

/// A failure attached to one `(node, attribute, aspect)` application.
///
/// Diagnostics accumulate across an evaluation pass instead of failing it
/// fast; see the engine's pass report.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The dependency node the aspect was being applied to.
    pub node: NodeId,
    /// The attribute the propagation traversed.
    pub attribute: String,
    /// Display form of the aspect descriptor involved.
    pub aspect: String,
    /// The underlying failure.
    pub error: AspectError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aspect '{}' on node '{}' (attribute '{}'): {}",
            self.aspect, self.node, self.attribute, self.error
        )
    }
}
