//! Read-only sync preview.
//!
//! Classifies a resource type against the manifest with the same decision
//! sequence as the executor, writing nothing. Updates carry a unified diff
//! of the pretty-printed old/new field values.

use std::collections::HashSet;

use similar::TextDiff;

use converge_client::ManifestSource;
use converge_core::types::{GlobalId, ResourceData, ServiceScope, TypeName};
use converge_core::{ResourceStore, StoreError, TypeRegistry};

use crate::error::SyncError;
use crate::executor::{label_for, local_from_remote};
use crate::resolver::{resolve_creation, CreateDecision};

/// One operation a sync run would apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChange {
    Create {
        global_id: GlobalId,
        label: String,
    },
    Update {
        global_id: GlobalId,
        label: String,
        /// True when the update re-identifies a partially-migrated record.
        adopted: bool,
        unified_diff: String,
    },
    Delete {
        global_id: GlobalId,
        label: String,
    },
    Conflict {
        global_id: GlobalId,
        message: String,
    },
}

/// Preview result for one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePreview {
    pub type_name: TypeName,
    /// False when the server publishes no manifest for this type.
    pub manifest_found: bool,
    pub changes: Vec<PlannedChange>,
}

/// Compute what a sync run would change for one resource type.
///
/// Store failures are fatal here — nothing is being applied, so there is no
/// partial progress to protect.
pub fn preview_type(
    client: &dyn ManifestSource,
    store: &dyn ResourceStore,
    registry: &TypeRegistry,
    type_name: &TypeName,
    scope: &ServiceScope,
) -> Result<TypePreview, SyncError> {
    let Some(entries) = client.get_manifest(type_name, scope)? else {
        return Ok(TypePreview {
            type_name: type_name.clone(),
            manifest_found: false,
            changes: Vec::new(),
        });
    };
    let descriptor = registry
        .get(type_name)
        .ok_or_else(|| SyncError::UnknownType(type_name.clone()))?;

    let manifest_ids: HashSet<GlobalId> = entries.iter().map(|e| e.global_id.clone()).collect();
    // Ids the run would leave present: manifest ids plus the old ids of
    // records an adoption would re-identify (the executor mutates before the
    // orphan pass; the preview has to track them by hand).
    let mut claimed = manifest_ids.clone();
    let mut changes = Vec::new();

    for entry in &entries {
        match store.get_by_global_id(type_name, &entry.global_id)? {
            Some(local) => {
                if local.fingerprint() == entry.fingerprint {
                    continue;
                }
                let remote = client.get_resource(&entry.global_id)?;
                let replacement = local_from_remote(descriptor, &remote);
                changes.push(PlannedChange::Update {
                    global_id: entry.global_id.clone(),
                    label: label_for(descriptor, &replacement),
                    adopted: false,
                    unified_diff: unified_data_diff(
                        &entry.global_id,
                        &local.data,
                        &replacement.data,
                    )?,
                });
            }
            None => {
                let remote = client.get_resource(&entry.global_id)?;
                match resolve_creation(store, descriptor, &remote, &manifest_ids)? {
                    CreateDecision::Create => {
                        let resource = local_from_remote(descriptor, &remote);
                        changes.push(PlannedChange::Create {
                            global_id: entry.global_id.clone(),
                            label: label_for(descriptor, &resource),
                        });
                    }
                    CreateDecision::AdoptAndUpdate(existing) => {
                        claimed.insert(existing.global_id.clone());
                        let adopted = local_from_remote(descriptor, &remote);
                        changes.push(PlannedChange::Update {
                            global_id: entry.global_id.clone(),
                            label: label_for(descriptor, &adopted),
                            adopted: true,
                            unified_diff: unified_data_diff(
                                &entry.global_id,
                                &existing.data,
                                &adopted.data,
                            )?,
                        });
                    }
                    CreateDecision::Conflict(existing) => {
                        changes.push(PlannedChange::Conflict {
                            global_id: entry.global_id.clone(),
                            message: format!(
                                "natural key for {type_name} is already owned by {}",
                                existing.global_id
                            ),
                        });
                    }
                }
            }
        }
    }

    for orphan in store.list(type_name, scope)? {
        if !claimed.contains(&orphan.global_id) {
            changes.push(PlannedChange::Delete {
                global_id: orphan.global_id.clone(),
                label: label_for(descriptor, &orphan),
            });
        }
    }

    Ok(TypePreview {
        type_name: type_name.clone(),
        manifest_found: true,
        changes,
    })
}

fn unified_data_diff(
    global_id: &GlobalId,
    old: &ResourceData,
    new: &ResourceData,
) -> Result<String, SyncError> {
    let old_text = pretty_json(old)?;
    let new_text = pretty_json(new)?;
    let old_header = format!("a/{global_id}");
    let new_header = format!("b/{global_id}");
    Ok(TextDiff::from_lines(&old_text, &new_text)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string())
}

fn pretty_json(data: &ResourceData) -> Result<String, SyncError> {
    let mut object = serde_json::Map::new();
    for (field, value) in data {
        object.insert(field.clone(), value.clone());
    }
    let mut text = serde_json::to_string_pretty(&serde_json::Value::Object(object))
        .map_err(StoreError::from)?;
    text.push('\n');
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
