//! Field-level diff between two versions of a resource.
//!
//! Used by conflict detection and change-significance checks. Content-hidden
//! fields never expose their raw values: both sides of an added, removed, or
//! changed hidden field are rendered as [`ENCRYPTED_PLACEHOLDER`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::DiffError;
use crate::registry::{TypeDescriptor, TypeRegistry};
use crate::types::{Resource, ResourceData};

/// Fixed stand-in for the value of a content-hidden field.
pub const ENCRYPTED_PLACEHOLDER: &str = "$encrypted$";

// ---------------------------------------------------------------------------
// Diff value types
// ---------------------------------------------------------------------------

/// Old/new pair for one changed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Field-level differences between two resource versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub added_fields: BTreeMap<String, Value>,
    pub removed_fields: BTreeMap<String, Value>,
    pub changed_fields: BTreeMap<String, FieldChange>,
}

impl FieldDiff {
    pub fn has_changes(&self) -> bool {
        !self.added_fields.is_empty()
            || !self.removed_fields.is_empty()
            || !self.changed_fields.is_empty()
    }
}

/// Options for [`diff`].
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Fail with [`DiffError::TypeMismatch`] when `old` and `new` are of
    /// different kinds.
    pub require_type_match: bool,
    /// Fields removed from whatever subset remains after `limit_fields`.
    pub exclude_fields: Vec<String>,
    /// When set, narrows the diff to this field subset.
    pub limit_fields: Option<Vec<String>>,
    /// Render related-entity values as their display key instead of the raw
    /// reference object.
    pub json_safe: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            require_type_match: true,
            exclude_fields: Vec::new(),
            limit_fields: None,
            json_safe: true,
        }
    }
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

/// Compute the field-level diff between two resource versions.
///
/// `old = None` means every eligible field of `new` is added; `new = None`
/// means every eligible field of `old` is removed; both present means fields
/// with differing values are changed and identical fields are omitted. Both
/// `None` yields an empty diff.
pub fn diff(
    old: Option<&Resource>,
    new: Option<&Resource>,
    registry: &TypeRegistry,
    options: &DiffOptions,
) -> Result<FieldDiff, DiffError> {
    let old_descriptor = descriptor_for(old, registry)?;
    let new_descriptor = descriptor_for(new, registry)?;

    if let (Some(old_desc), Some(new_desc)) = (old_descriptor, new_descriptor) {
        if options.require_type_match && old_desc.name != new_desc.name {
            return Err(DiffError::TypeMismatch {
                old: old_desc.name.clone(),
                new: new_desc.name.clone(),
            });
        }
    }

    let old_fields = old
        .map(|r| eligible_fields(&r.data, options))
        .unwrap_or_default();
    let new_fields = new
        .map(|r| eligible_fields(&r.data, options))
        .unwrap_or_default();

    let mut result = FieldDiff::default();

    for (field, new_value) in &new_fields {
        match old_fields.get(field) {
            None => {
                result.added_fields.insert(
                    (*field).clone(),
                    render(new_descriptor, field, new_value, options, false),
                );
            }
            Some(old_value) if old_value != new_value => {
                // Hidden on either side hides both sides of the pair.
                let hidden = is_hidden(old_descriptor, field) || is_hidden(new_descriptor, field);
                result.changed_fields.insert(
                    (*field).clone(),
                    FieldChange {
                        old: render(old_descriptor, field, old_value, options, hidden),
                        new: render(new_descriptor, field, new_value, options, hidden),
                    },
                );
            }
            Some(_) => {}
        }
    }

    for (field, old_value) in &old_fields {
        if !new_fields.contains_key(field) {
            result.removed_fields.insert(
                (*field).clone(),
                render(old_descriptor, field, old_value, options, false),
            );
        }
    }

    Ok(result)
}

fn descriptor_for<'a>(
    resource: Option<&Resource>,
    registry: &'a TypeRegistry,
) -> Result<Option<&'a TypeDescriptor>, DiffError> {
    match resource {
        None => Ok(None),
        Some(r) => match registry.get(&r.resource_type) {
            Some(descriptor) => Ok(Some(descriptor)),
            None => Err(DiffError::UnknownType {
                name: r.resource_type.clone(),
            }),
        },
    }
}

fn eligible_fields<'a>(
    data: &'a ResourceData,
    options: &DiffOptions,
) -> BTreeMap<&'a String, &'a Value> {
    data.iter()
        .filter(|(field, _)| match &options.limit_fields {
            Some(limit) => limit.iter().any(|f| f == *field),
            None => true,
        })
        .filter(|(field, _)| !options.exclude_fields.iter().any(|f| f == *field))
        .collect()
}

fn is_hidden(descriptor: Option<&TypeDescriptor>, field: &str) -> bool {
    descriptor.map(|d| d.is_hidden(field)).unwrap_or(false)
}

fn render(
    descriptor: Option<&TypeDescriptor>,
    field: &str,
    value: &Value,
    options: &DiffOptions,
    force_hidden: bool,
) -> Value {
    if force_hidden || is_hidden(descriptor, field) {
        return Value::String(ENCRYPTED_PLACEHOLDER.to_string());
    }
    if options.json_safe {
        if let Some(display) = descriptor.and_then(|d| d.related_display(field)) {
            if let Some(inner) = value.as_object().and_then(|obj| obj.get(display)) {
                return inner.clone();
            }
        }
    }
    value.clone()
}

// ---------------------------------------------------------------------------
// Tests — full contract coverage lives in tests/diff_tests.rs
// ---------------------------------------------------------------------------
