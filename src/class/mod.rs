//! Aspect class identity.
//!
//! An [`AspectClass`] names the *kind* of an aspect without parameters. The
//! variant set is closed and small, so it is a tagged sum type rather than a
//! trait object:
//!
//! - `Native`: compiled into the host process, unique by name within an
//!   explicitly constructed [`AspectRegistry`].
//! - `Dynamic`: defined by a `(source location, symbol)` pair loaded at
//!   evaluation time. Identity is structural equality of the pair; dynamic
//!   classes are never registered.

mod registry;

pub use registry::AspectRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of the source unit that defines a dynamic aspect.
///
/// Opaque label; the dynamic symbol loader decides how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation(String);

impl SourceLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceLocation {
    fn from(location: &str) -> Self {
        Self::new(location)
    }
}

/// The kind of an aspect, without parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AspectClass {
    /// Natively compiled implementation, identified by registry name.
    Native { name: String },
    /// Dynamically loaded `(location, symbol)` pair; identity is structural.
    Dynamic {
        location: SourceLocation,
        symbol: String,
    },
}

impl AspectClass {
    pub fn native(name: impl Into<String>) -> Self {
        Self::Native { name: name.into() }
    }

    pub fn dynamic(location: impl Into<SourceLocation>, symbol: impl Into<String>) -> Self {
        Self::Dynamic {
            location: location.into(),
            symbol: symbol.into(),
        }
    }

    /// Human-readable name: the registry name for native classes, the
    /// `location%symbol` form for dynamic ones.
    pub fn display_name(&self) -> String {
        match self {
            Self::Native { name } => name.clone(),
            Self::Dynamic { location, symbol } => format!("{location}%{symbol}"),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native { .. })
    }
}

impl From<String> for SourceLocation {
    fn from(location: String) -> Self {
        Self(location)
    }
}

impl fmt::Display for AspectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
