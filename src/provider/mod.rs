//! Provider identities, values, and conflict-checked merging.
//!
//! A provider is an opaque, identity-keyed unit of output data attached to a
//! graph node. This crate never interprets provider payloads; it only
//! compares them for equality when two sources export the same identity onto
//! one node.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::{AspectError, Result};

/// Identity of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque provider payload. Compared for equality during merge, never
/// interpreted.
pub type ProviderValue = Value;

/// An identity-keyed set of providers attached to one node.
///
/// Ordered by provider identity so iteration and serialization are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMap {
    entries: BTreeMap<ProviderId, ProviderValue>,
}

impl ProviderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a provider. Plain construction-time mutation; use
    /// [`MergeBuilder`] when conflicting values must be detected instead of
    /// overwritten.
    pub fn insert(&mut self, id: impl Into<ProviderId>, value: ProviderValue) -> Option<ProviderValue> {
        self.entries.insert(id.into(), value)
    }

    pub fn get(&self, id: &ProviderId) -> Option<&ProviderValue> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.entries.contains_key(id)
    }

    /// True when every identity in `ids` is present.
    pub fn contains_all<'a>(&self, ids: impl IntoIterator<Item = &'a ProviderId>) -> bool {
        ids.into_iter().all(|id| self.contains(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProviderId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderId, &ProviderValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ProviderId, ProviderValue)> for ProviderMap {
    fn from_iter<T: IntoIterator<Item = (ProviderId, ProviderValue)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

/// Conflict-checked union of provider maps from several labeled sources.
///
/// The same identity arriving twice with an equal value is idempotent; with a
/// differing value it fails with [`AspectError::ProviderConflict`] naming
/// both exporting sources. There is no precedence order: a collision between
/// unrelated sources is a hard error.
#[derive(Debug, Default)]
pub struct MergeBuilder {
    merged: ProviderMap,
    sources: BTreeMap<ProviderId, String>,
}

impl MergeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every provider from `providers`, attributed to `source`.
    pub fn absorb(&mut self, source: &str, providers: &ProviderMap) -> Result<()> {
        for (id, value) in providers.iter() {
            match self.merged.get(id) {
                None => {
                    self.merged.insert(id.clone(), value.clone());
                    self.sources.insert(id.clone(), source.to_string());
                }
                Some(existing) if existing == value => {}
                Some(_) => {
                    let first = self
                        .sources
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| "<unknown>".to_string());
                    return Err(AspectError::ProviderConflict {
                        provider: id.clone(),
                        first,
                        second: source.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> ProviderMap {
        self.merged
    }
}
