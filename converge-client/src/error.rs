//! Error types for converge-client.

use thiserror::Error;

use converge_core::types::{GlobalId, TypeName};

/// All errors that can arise from the manifest client.
///
/// A manifest endpoint that is legitimately absent (HTTP 404) is NOT an
/// error; [`crate::ManifestSource::get_manifest`] reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The manifest endpoint answered with a non-2xx status other than 404.
    /// Fatal for the resource type being synced.
    #[error("manifest for {type_name} unavailable: HTTP {status}")]
    ManifestUnavailable { type_name: TypeName, status: u16 },

    /// Network-level failure (DNS, connect, timeout) or an unexpected status
    /// on a non-manifest endpoint.
    #[error("transport error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// A manifest row that does not parse as `global_id,fingerprint`.
    #[error("malformed manifest row: {line:?}")]
    MalformedManifest { line: String },

    /// The response body could not be read or decoded.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The resource server has no resource under this global id.
    #[error("no resource {global_id} on the resource server")]
    NotFound { global_id: GlobalId },
}
