//! Test support: a canned, in-memory [`ManifestSource`].
//!
//! Lets executor behavior be exercised without HTTP or storage fixtures.
//! `publish` registers a resource and its manifest row in one step, with the
//! fingerprint computed the same way the engine compares it.

use std::collections::BTreeMap;

use converge_client::{
    ClientError, ManifestEntry, ManifestSource, RemoteResource, ServiceMetadata,
};
use converge_core::types::{content_fingerprint, GlobalId, ServiceId, ServiceScope, TypeName};

/// What a [`StaticSource`] answers for one resource type's manifest.
#[derive(Debug, Clone)]
pub enum ManifestState {
    /// Manifest endpoint absent (HTTP 404).
    Missing,
    /// Manifest endpoint failing with this status.
    Unavailable(u16),
    /// Manifest rows to return.
    Entries(Vec<ManifestEntry>),
}

/// Canned manifest source backed by in-memory fixtures.
#[derive(Debug, Clone)]
pub struct StaticSource {
    service_id: ServiceId,
    types: Vec<TypeName>,
    manifests: BTreeMap<TypeName, ManifestState>,
    resources: BTreeMap<GlobalId, RemoteResource>,
}

impl StaticSource {
    pub fn new(service_id: impl Into<ServiceId>) -> Self {
        Self {
            service_id: service_id.into(),
            types: Vec::new(),
            manifests: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    /// Register a remote resource and append its manifest row.
    pub fn publish(&mut self, remote: RemoteResource) {
        let resource_type = remote.resource_type.clone();
        if !self.types.contains(&resource_type) {
            self.types.push(resource_type.clone());
        }

        let entry = ManifestEntry {
            global_id: remote.global_id.clone(),
            fingerprint: content_fingerprint(&remote.resource_data),
        };
        match self.manifests.get_mut(&resource_type) {
            Some(ManifestState::Entries(entries)) => entries.push(entry),
            _ => {
                self.manifests
                    .insert(resource_type, ManifestState::Entries(vec![entry]));
            }
        }
        self.resources.insert(remote.global_id.clone(), remote);
    }

    /// Make a type's manifest endpoint answer 404 (soft not-found).
    pub fn without_manifest(&mut self, resource_type: impl Into<TypeName>) {
        let resource_type = resource_type.into();
        if !self.types.contains(&resource_type) {
            self.types.push(resource_type.clone());
        }
        self.manifests.insert(resource_type, ManifestState::Missing);
    }

    /// Drop a resource payload while keeping its manifest row, so detail
    /// fetches for it fail with not-found.
    pub fn forget_resource(&mut self, global_id: &GlobalId) {
        self.resources.remove(global_id);
    }

    /// Make a type's manifest endpoint fail with `status`.
    pub fn failing_manifest(&mut self, resource_type: impl Into<TypeName>, status: u16) {
        let resource_type = resource_type.into();
        if !self.types.contains(&resource_type) {
            self.types.push(resource_type.clone());
        }
        self.manifests
            .insert(resource_type, ManifestState::Unavailable(status));
    }
}

impl ManifestSource for StaticSource {
    fn service_metadata(&self) -> Result<ServiceMetadata, ClientError> {
        Ok(ServiceMetadata {
            service_id: self.service_id.clone(),
        })
    }

    fn list_resource_types(&self) -> Result<Vec<TypeName>, ClientError> {
        Ok(self.types.clone())
    }

    fn get_manifest(
        &self,
        resource_type: &TypeName,
        _scope: &ServiceScope,
    ) -> Result<Option<Vec<ManifestEntry>>, ClientError> {
        match self.manifests.get(resource_type) {
            None | Some(ManifestState::Missing) => Ok(None),
            Some(ManifestState::Unavailable(status)) => Err(ClientError::ManifestUnavailable {
                type_name: resource_type.clone(),
                status: *status,
            }),
            Some(ManifestState::Entries(entries)) => Ok(Some(entries.clone())),
        }
    }

    fn get_resource(&self, global_id: &GlobalId) -> Result<RemoteResource, ClientError> {
        self.resources
            .get(global_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                global_id: global_id.clone(),
            })
    }
}
