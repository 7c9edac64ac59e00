//! Sync executor — converges the local store with the remote manifest.
//!
//! State machine per manifest entry:
//!
//! ```text
//! lookup by global id ─ found ──> fingerprint equal ──> NOOP
//!       │                  └───── differs ───────────> UPDATE
//!       └─ not found ─> resolver ─> Create ──────────> CREATE
//!                                ├> AdoptAndUpdate ──> UPDATE (re-identified)
//!                                └> Conflict ────────> ERROR (entry skipped)
//! ```
//!
//! After all entries of a type, in-scope local resources absent from the
//! manifest are deleted as orphans. Running twice against unchanged state
//! yields only NOOPs on the second run.

use std::collections::HashSet;

use converge_client::{ManifestEntry, ManifestSource, RemoteResource};
use converge_core::registry::TypeDescriptor;
use converge_core::types::{GlobalId, Resource, ServiceScope, TypeName};
use converge_core::{diff, DiffOptions, ResourceStore, TypeRegistry};

use crate::error::SyncError;
use crate::report::{Operation, ReportSink, SyncFailure, SyncResult, TypeCounts};
use crate::resolver::{resolve_creation, CreateDecision};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration surface of a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Resource types to sync; defaults to everything the server publishes.
    pub resource_type_names: Option<Vec<TypeName>>,
    /// Service scope; defaults to the remote authority's own identifier.
    pub scope: Option<ServiceScope>,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Orchestrates one sync run. All run bookkeeping lives in the
/// [`SyncResult`] threaded through every step; nothing is global.
pub struct SyncExecutor<'a> {
    client: &'a dyn ManifestSource,
    store: &'a mut dyn ResourceStore,
    registry: &'a TypeRegistry,
    sink: &'a mut dyn ReportSink,
    options: SyncOptions,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(
        client: &'a dyn ManifestSource,
        store: &'a mut dyn ResourceStore,
        registry: &'a TypeRegistry,
        sink: &'a mut dyn ReportSink,
        options: SyncOptions,
    ) -> Self {
        Self {
            client,
            store,
            registry,
            sink,
            options,
        }
    }

    /// Run the sync. Fatal only on manifest client failure; every per-entry
    /// failure is recorded in the result and processing continues.
    pub fn run(mut self) -> Result<SyncResult, SyncError> {
        let scope = match self.options.scope.clone() {
            Some(scope) => scope,
            None => ServiceScope::Service(self.client.service_metadata()?.service_id),
        };
        let type_names = match self.options.resource_type_names.clone() {
            Some(names) => names,
            None => self.client.list_resource_types()?,
        };

        let mut result = SyncResult::default();
        for type_name in &type_names {
            self.sync_type(type_name, &scope, &mut result)?;
        }
        Ok(result)
    }

    fn sync_type(
        &mut self,
        type_name: &TypeName,
        scope: &ServiceScope,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        // Drain the manifest completely before touching the store.
        let Some(entries) = self.client.get_manifest(type_name, scope)? else {
            self.sink.line(&format!("manifest for {type_name} NOT FOUND."));
            return Ok(());
        };

        let Some(descriptor) = self.registry.get(type_name) else {
            let message = format!("resource type {type_name} is not registered locally");
            tracing::warn!("{message}");
            self.sink.line(&format!("ERROR - lookup failed: {message}"));
            result.errors.push(SyncFailure {
                global_id: None,
                operation: Operation::Lookup,
                message,
            });
            return Ok(());
        };

        tracing::info!("syncing {} manifest entries for {type_name}", entries.len());
        let manifest_ids: HashSet<GlobalId> =
            entries.iter().map(|e| e.global_id.clone()).collect();

        let mut counts = TypeCounts::default();
        for entry in &entries {
            self.sync_entry(descriptor, entry, &manifest_ids, &mut counts, result);
        }
        self.delete_orphans(descriptor, &manifest_ids, scope, &mut counts, result);

        self.sink.line(&counts.summary(type_name));
        Ok(())
    }

    fn sync_entry(
        &mut self,
        descriptor: &TypeDescriptor,
        entry: &ManifestEntry,
        manifest_ids: &HashSet<GlobalId>,
        counts: &mut TypeCounts,
        result: &mut SyncResult,
    ) {
        match self.store.get_by_global_id(&descriptor.name, &entry.global_id) {
            Ok(Some(local)) => self.refresh_existing(descriptor, entry, local, counts, result),
            Ok(None) => self.create_missing(descriptor, entry, manifest_ids, counts, result),
            Err(err) => self.record_failure(
                Some(entry.global_id.clone()),
                Operation::Lookup,
                err.to_string(),
                counts,
                result,
            ),
        }
    }

    /// Entry has a local match by global id: NOOP or UPDATE.
    fn refresh_existing(
        &mut self,
        descriptor: &TypeDescriptor,
        entry: &ManifestEntry,
        local: Resource,
        counts: &mut TypeCounts,
        result: &mut SyncResult,
    ) {
        if local.fingerprint() == entry.fingerprint {
            self.sink.line(&format!("NOOP {}", entry.global_id));
            result.noop.insert(entry.global_id.clone());
            counts.skipped += 1;
            return;
        }

        let remote = match self.client.get_resource(&entry.global_id) {
            Ok(remote) => remote,
            Err(err) => {
                return self.record_failure(
                    Some(entry.global_id.clone()),
                    Operation::Fetch,
                    err.to_string(),
                    counts,
                    result,
                )
            }
        };

        let replacement = local_from_remote(descriptor, &remote);
        self.log_field_changes(&local, &replacement);
        let label = label_for(descriptor, &replacement);

        match self.store.update(&entry.global_id, replacement) {
            Ok(()) => {
                self.sink.line(&format!("UPDATED {} {label}", entry.global_id));
                result.updated.insert(entry.global_id.clone(), label);
                counts.updated += 1;
            }
            Err(err) => self.record_failure(
                Some(entry.global_id.clone()),
                Operation::Update,
                err.to_string(),
                counts,
                result,
            ),
        }
    }

    /// Entry has no local match by global id: CREATE, adopt, or conflict.
    fn create_missing(
        &mut self,
        descriptor: &TypeDescriptor,
        entry: &ManifestEntry,
        manifest_ids: &HashSet<GlobalId>,
        counts: &mut TypeCounts,
        result: &mut SyncResult,
    ) {
        let remote = match self.client.get_resource(&entry.global_id) {
            Ok(remote) => remote,
            Err(err) => {
                return self.record_failure(
                    Some(entry.global_id.clone()),
                    Operation::Fetch,
                    err.to_string(),
                    counts,
                    result,
                )
            }
        };

        let decision = match resolve_creation(&*self.store, descriptor, &remote, manifest_ids) {
            Ok(decision) => decision,
            Err(err) => {
                return self.record_failure(
                    Some(entry.global_id.clone()),
                    Operation::Lookup,
                    err.to_string(),
                    counts,
                    result,
                )
            }
        };

        match decision {
            CreateDecision::Create => {
                let resource = local_from_remote(descriptor, &remote);
                let label = label_for(descriptor, &resource);
                match self.store.create(resource) {
                    Ok(()) => {
                        self.sink.line(&format!("CREATED {} {label}", entry.global_id));
                        result.created.insert(entry.global_id.clone(), label);
                        counts.created += 1;
                    }
                    Err(err) => self.record_failure(
                        Some(entry.global_id.clone()),
                        Operation::Create,
                        err.to_string(),
                        counts,
                        result,
                    ),
                }
            }
            CreateDecision::AdoptAndUpdate(existing) => {
                tracing::debug!(
                    "adopting partially migrated {} as {}",
                    existing.global_id,
                    remote.global_id
                );
                let adopted = local_from_remote(descriptor, &remote);
                self.log_field_changes(&existing, &adopted);
                let label = label_for(descriptor, &adopted);
                match self.store.update(&existing.global_id, adopted) {
                    Ok(()) => {
                        self.sink.line(&format!("UPDATED {} {label}", entry.global_id));
                        result.updated.insert(entry.global_id.clone(), label);
                        counts.updated += 1;
                    }
                    Err(err) => self.record_failure(
                        Some(entry.global_id.clone()),
                        Operation::Update,
                        err.to_string(),
                        counts,
                        result,
                    ),
                }
            }
            CreateDecision::Conflict(existing) => {
                let message = match descriptor.natural_key_of(&remote.resource_data) {
                    Some(key) => format!(
                        "natural key {key} for {} is already owned by {}",
                        descriptor.name, existing.global_id
                    ),
                    None => format!(
                        "natural key for {} is already owned by {}",
                        descriptor.name, existing.global_id
                    ),
                };
                self.record_failure(
                    Some(entry.global_id.clone()),
                    Operation::Create,
                    message,
                    counts,
                    result,
                );
            }
        }
    }

    /// Delete in-scope local resources that this run's manifest never named.
    fn delete_orphans(
        &mut self,
        descriptor: &TypeDescriptor,
        manifest_ids: &HashSet<GlobalId>,
        scope: &ServiceScope,
        counts: &mut TypeCounts,
        result: &mut SyncResult,
    ) {
        let local = match self.store.list(&descriptor.name, scope) {
            Ok(local) => local,
            Err(err) => {
                self.record_failure(None, Operation::Lookup, err.to_string(), counts, result);
                return;
            }
        };
        let orphans: Vec<Resource> = local
            .into_iter()
            .filter(|r| !manifest_ids.contains(&r.global_id))
            .collect();

        self.sink
            .line(&format!("Deleting {} orphaned resources", orphans.len()));

        for orphan in orphans {
            let label = label_for(descriptor, &orphan);
            match self.store.delete(&descriptor.name, &orphan.global_id) {
                Ok(()) => {
                    self.sink.line(&format!("DELETED {} {label}", orphan.global_id));
                    result.deleted.insert(orphan.global_id.clone(), label);
                    counts.deleted += 1;
                }
                Err(err) => self.record_failure(
                    Some(orphan.global_id.clone()),
                    Operation::Delete,
                    err.to_string(),
                    counts,
                    result,
                ),
            }
        }
    }

    fn record_failure(
        &mut self,
        global_id: Option<GlobalId>,
        operation: Operation,
        message: String,
        counts: &mut TypeCounts,
        result: &mut SyncResult,
    ) {
        let subject = global_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        tracing::warn!("{operation} failed for {subject}: {message}");
        self.sink
            .line(&format!("ERROR {subject} {operation} failed: {message}"));
        counts.errors += 1;
        result.errors.push(SyncFailure {
            global_id,
            operation,
            message,
        });
    }

    // Sanitized visibility into what an update touches. Hidden fields come
    // through as the placeholder, never their raw values.
    fn log_field_changes(&self, local: &Resource, replacement: &Resource) {
        match diff(Some(local), Some(replacement), self.registry, &DiffOptions::default()) {
            Ok(delta) if delta.has_changes() => {
                let fields: Vec<&String> = delta
                    .changed_fields
                    .keys()
                    .chain(delta.added_fields.keys())
                    .chain(delta.removed_fields.keys())
                    .collect();
                tracing::debug!("{} fields changing: {fields:?}", local.global_id);
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("diff unavailable for {}: {err}", local.global_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Local record shape for a remote payload. Anything reconciled from a
/// manifest is fully migrated by definition.
pub(crate) fn local_from_remote(descriptor: &TypeDescriptor, remote: &RemoteResource) -> Resource {
    Resource {
        global_id: remote.global_id.clone(),
        service_id: remote.service_id.clone(),
        resource_type: descriptor.name.clone(),
        is_partially_migrated: false,
        data: remote.resource_data.clone(),
    }
}

pub(crate) fn label_for(descriptor: &TypeDescriptor, resource: &Resource) -> String {
    descriptor
        .label_of(&resource.data)
        .unwrap_or_else(|| resource.global_id.to_string())
}
