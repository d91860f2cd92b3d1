//! Core types shared across the engine: node and configuration identities,
//! the crate-wide error enum, and the diagnostic record used for
//! partial-failure reporting.

mod error;

pub use error::{AspectError, Diagnostic, Result};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a dependency-graph node.
///
/// Opaque to this crate: the surrounding evaluator decides what a node label
/// means. Two nodes are the same node exactly when their identities compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of the configuration an evaluation runs under.
///
/// Part of the `(descriptor, node, configuration)` key for configured-aspect
/// memoization; evaluations under different configurations never share a
/// cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigurationId(String);

impl ConfigurationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigurationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
