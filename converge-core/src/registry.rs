//! Resource-type registry.
//!
//! Maps a resource-type tag to a descriptor bundling its natural-key fields,
//! content-hidden fields, related-entity fields, and label field. Populated
//! once at process start and treated as immutable afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{NaturalKey, ResourceData, TypeName};

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// A field whose value is a reference to another entity.
///
/// `display` names the key inside the related object used as its
/// human-readable stand-in (e.g. an organization's `name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedField {
    pub field: String,
    pub display: String,
}

/// Everything the engine needs to know about one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: TypeName,
    /// Field names whose combined values uniquely identify a resource from a
    /// business-logic perspective, independent of assigned identifiers.
    pub natural_key: Vec<String>,
    /// Fields whose values must never appear in diffs or logs.
    #[serde(default)]
    pub hidden_fields: Vec<String>,
    #[serde(default)]
    pub related_fields: Vec<RelatedField>,
    /// Field rendered next to the global id in report lines.
    pub label_field: String,
}

impl TypeDescriptor {
    /// Natural-key values of `data`, or `None` if any key field is absent.
    pub fn natural_key_of(&self, data: &ResourceData) -> Option<NaturalKey> {
        let mut values = Vec::with_capacity(self.natural_key.len());
        for field in &self.natural_key {
            let value = data.get(field)?;
            values.push(self.key_value(field, value));
        }
        Some(NaturalKey(values))
    }

    /// Label value of `data`, if present.
    pub fn label_of(&self, data: &ResourceData) -> Option<String> {
        data.get(&self.label_field).map(display_value)
    }

    pub fn is_hidden(&self, field: &str) -> bool {
        self.hidden_fields.iter().any(|f| f == field)
    }

    /// Display key for a related-entity field, if `field` is one.
    pub fn related_display(&self, field: &str) -> Option<&str> {
        self.related_fields
            .iter()
            .find(|r| r.field == field)
            .map(|r| r.display.as_str())
    }

    // Related-entity values key on their display field rather than the raw
    // object, so a reference compares stably across serializations.
    fn key_value(&self, field: &str, value: &serde_json::Value) -> String {
        if let Some(display) = self.related_display(field) {
            if let Some(inner) = value.as_object().and_then(|obj| obj.get(display)) {
                return display_value(inner);
            }
        }
        display_value(value)
    }
}

/// Render a JSON value as a plain display string (no quotes around strings).
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable map of every syncable resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRegistry {
    types: BTreeMap<TypeName, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the shared resource types every deployment carries.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TypeDescriptor {
            name: TypeName::from("shared.user"),
            natural_key: vec!["username".to_string()],
            hidden_fields: vec!["password".to_string()],
            related_fields: vec![],
            label_field: "username".to_string(),
        });
        registry.register(TypeDescriptor {
            name: TypeName::from("shared.team"),
            natural_key: vec!["name".to_string(), "organization".to_string()],
            hidden_fields: vec![],
            related_fields: vec![RelatedField {
                field: "organization".to_string(),
                display: "name".to_string(),
            }],
            label_field: "name".to_string(),
        });
        registry.register(TypeDescriptor {
            name: TypeName::from("shared.organization"),
            natural_key: vec!["name".to_string()],
            hidden_fields: vec![],
            related_fields: vec![],
            label_field: "name".to_string(),
        });
        registry
    }

    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &TypeName) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn names(&self) -> Vec<TypeName> {
        self.types.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user_data(username: &str) -> ResourceData {
        let mut data = ResourceData::new();
        data.insert("username".to_string(), json!(username));
        data.insert("email".to_string(), json!(format!("{username}@example.com")));
        data
    }

    #[test]
    fn builtin_covers_shared_types() {
        let registry = TypeRegistry::builtin();
        for name in ["shared.user", "shared.team", "shared.organization"] {
            assert!(registry.get(&TypeName::from(name)).is_some(), "missing {name}");
        }
        assert_eq!(registry.names().len(), 3);
    }

    #[test]
    fn natural_key_of_user_is_username() {
        let registry = TypeRegistry::builtin();
        let descriptor = registry.get(&TypeName::from("shared.user")).expect("descriptor");
        let key = descriptor.natural_key_of(&user_data("theceo")).expect("key");
        assert_eq!(key, NaturalKey(vec!["theceo".to_string()]));
    }

    #[test]
    fn natural_key_missing_field_is_none() {
        let registry = TypeRegistry::builtin();
        let descriptor = registry.get(&TypeName::from("shared.user")).expect("descriptor");
        let mut data = ResourceData::new();
        data.insert("email".to_string(), json!("nobody@example.com"));
        assert!(descriptor.natural_key_of(&data).is_none());
    }

    #[test]
    fn team_key_uses_related_display_value() {
        let registry = TypeRegistry::builtin();
        let descriptor = registry.get(&TypeName::from("shared.team")).expect("descriptor");
        let mut data = ResourceData::new();
        data.insert("name".to_string(), json!("ops"));
        data.insert(
            "organization".to_string(),
            json!({"global_id": "3e3cc6a4", "name": "Serious Company"}),
        );

        let key = descriptor.natural_key_of(&data).expect("key");
        assert_eq!(
            key,
            NaturalKey(vec!["ops".to_string(), "Serious Company".to_string()])
        );
    }

    #[test]
    fn label_and_hidden_lookups() {
        let registry = TypeRegistry::builtin();
        let descriptor = registry.get(&TypeName::from("shared.user")).expect("descriptor");
        assert_eq!(descriptor.label_of(&user_data("phi")), Some("phi".to_string()));
        assert!(descriptor.is_hidden("password"));
        assert!(!descriptor.is_hidden("email"));
    }
}
