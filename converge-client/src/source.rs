//! The manifest source contract consumed by the sync executor.

use serde::Deserialize;

use converge_core::types::{GlobalId, ResourceData, ServiceId, ServiceScope, TypeName};

use crate::error::ClientError;

/// Identity of the remote authority behind a resource server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceMetadata {
    pub service_id: ServiceId,
}

/// One remote-reported `(global_id, fingerprint)` manifest row.
///
/// Ephemeral: recomputed on every sync run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub global_id: GlobalId,
    pub fingerprint: String,
}

/// Full remote payload for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteResource {
    pub global_id: GlobalId,
    pub service_id: ServiceId,
    pub resource_type: TypeName,
    pub resource_data: ResourceData,
}

/// Read-only view of the resource server's manifest surface.
///
/// Implementations must be side-effect free and must surface bounded-time
/// failures as [`ClientError`] rather than hang indefinitely.
pub trait ManifestSource {
    /// The remote authority's own service identity.
    fn service_metadata(&self) -> Result<ServiceMetadata, ClientError>;

    /// Names of every resource type the server publishes a manifest for.
    fn list_resource_types(&self) -> Result<Vec<TypeName>, ClientError>;

    /// The manifest for one resource type, scoped to `scope`.
    ///
    /// `Ok(None)` means the manifest endpoint is absent for this type — a
    /// soft condition, not an error.
    fn get_manifest(
        &self,
        resource_type: &TypeName,
        scope: &ServiceScope,
    ) -> Result<Option<Vec<ManifestEntry>>, ClientError>;

    /// Full payload for one resource, by global id.
    fn get_resource(&self, global_id: &GlobalId) -> Result<RemoteResource, ClientError>;
}
