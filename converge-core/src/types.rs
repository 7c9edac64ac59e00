//! Domain types for converge.
//!
//! Identifiers cross crate boundaries as string newtypes; never bare
//! `String`. Field values are JSON values keyed by field name in a sorted
//! map, so serialization (and therefore fingerprinting) is canonical.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed resource-type name, e.g. `shared.user`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeName(pub String);

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TypeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The cross-authority-stable identity of a resource, assigned once when the
/// resource is first reconciled. Distinct from any local primary key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalId(pub String);

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for GlobalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GlobalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifies the remote authority that currently owns/manages a resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub String);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ServiceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Service scope
// ---------------------------------------------------------------------------

/// Which remote authority a sync run is scoped to.
///
/// Renders as `all` or the service id; the manifest endpoint takes the same
/// string in its `service_id` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceScope {
    /// Bypass scoping entirely.
    All,
    /// Only resources owned by one authority.
    Service(ServiceId),
}

impl ServiceScope {
    /// Whether a resource owned by `service_id` falls inside this scope.
    pub fn includes(&self, service_id: &ServiceId) -> bool {
        match self {
            ServiceScope::All => true,
            ServiceScope::Service(scope) => scope == service_id,
        }
    }
}

impl fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceScope::All => write!(f, "all"),
            ServiceScope::Service(id) => id.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Serialized field values of one resource, keyed by field name.
pub type ResourceData = BTreeMap<String, serde_json::Value>;

/// The natural-key values of a resource, in descriptor field order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NaturalKey(pub Vec<String>);

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("+"))
    }
}

/// A local record of one synced resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub global_id: GlobalId,
    pub service_id: ServiceId,
    pub resource_type: TypeName,
    /// True when the resource was created locally before any remote
    /// authority claimed it with a global identity.
    #[serde(default)]
    pub is_partially_migrated: bool,
    pub data: ResourceData,
}

impl Resource {
    /// Content fingerprint of this resource's field values.
    pub fn fingerprint(&self) -> String {
        content_fingerprint(&self.data)
    }
}

/// SHA-256 hex digest of the canonical JSON serialization of `data`.
///
/// Keys are sorted (`BTreeMap` iteration order), so two maps with the same
/// contents always fingerprint identically regardless of how they were built.
/// The manifest's `fingerprint` column is computed the same way server-side.
pub fn content_fingerprint(data: &ResourceData) -> String {
    let mut object = serde_json::Map::new();
    for (field, value) in data {
        object.insert(field.clone(), value.clone());
    }
    let canonical = serde_json::Value::Object(object).to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
