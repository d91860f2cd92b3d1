//! Aspect parameters: the immutable key/value bag that specializes an aspect
//! class.
//!
//! Parameters are a canonical mapping from name to an *ordered* list of
//! string values. Keys are held in a sorted map, so equality, hashing, and
//! key serialization never depend on construction order. Value lists keep
//! the order they were given in; that order is part of the identity.
//!
//! There is no implicit merging across inheritance boundaries. Composition
//! is the caller's responsibility via explicit descriptor construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::{AspectError, Result};

/// Immutable, canonicalized multi-valued parameter bag.
///
/// ```
/// use aspect_engine::params::AspectParameters;
///
/// let a = AspectParameters::builder()
///     .put("mode", ["fast"])
///     .put("arch", ["x86_64", "aarch64"])
///     .build();
/// let b = AspectParameters::builder()
///     .put("arch", ["x86_64", "aarch64"])
///     .put("mode", ["fast"])
///     .build();
/// // Key insertion order never affects identity.
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AspectParameters {
    values: BTreeMap<String, Vec<String>>,
}

impl AspectParameters {
    /// The empty parameter bag.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> AspectParametersBuilder {
        AspectParametersBuilder { values: BTreeMap::new() }
    }

    /// Build parameters from an untyped JSON mapping.
    ///
    /// The root must be an object; each value must be a string or an array
    /// of strings. Anything else (notably `null` where a list was expected)
    /// fails with [`AspectError::InvalidParameter`].
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| AspectError::InvalidParameter {
            name: "<root>".into(),
            reason: format!("expected an object, got {}", json_type_name(value)),
        })?;

        let mut values = BTreeMap::new();
        for (name, entry) in object {
            if name.is_empty() {
                return Err(AspectError::InvalidParameter {
                    name: name.clone(),
                    reason: "parameter name must not be empty".into(),
                });
            }
            let list = match entry {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => {
                    let mut list = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::String(s) => list.push(s.clone()),
                            other => {
                                return Err(AspectError::InvalidParameter {
                                    name: name.clone(),
                                    reason: format!(
                                        "expected a string list element, got {}",
                                        json_type_name(other)
                                    ),
                                });
                            }
                        }
                    }
                    list
                }
                other => {
                    return Err(AspectError::InvalidParameter {
                        name: name.clone(),
                        reason: format!(
                            "expected a string or list of strings, got {}",
                            json_type_name(other)
                        ),
                    });
                }
            };
            values.insert(name.clone(), list);
        }
        Ok(Self { values })
    }

    /// Values for a parameter name, in declaration order.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate `(name, values)` pairs in canonical (sorted-name) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for AspectParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, values) in &self.values {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{name}={}", values.join("+"))?;
        }
        Ok(())
    }
}

/// Builder for [`AspectParameters`]. Re-putting a name replaces its values.
#[derive(Debug, Clone, Default)]
pub struct AspectParametersBuilder {
    values: BTreeMap<String, Vec<String>>,
}

impl AspectParametersBuilder {
    pub fn put(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.values.insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> AspectParameters {
        AspectParameters { values: self.values }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
