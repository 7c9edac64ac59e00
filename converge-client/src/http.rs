//! Blocking HTTP implementation of [`ManifestSource`].
//!
//! Endpoints consumed (all read-only):
//!
//! ```text
//! GET {base}/service-index/metadata/                          JSON
//! GET {base}/resource-types/                                  JSON
//! GET {base}/resource-types/{name}/manifest/?service_id=...   CSV
//! GET {base}/resources/{global_id}/                           JSON
//! ```

use std::time::Duration;

use serde::Deserialize;

use converge_core::types::{GlobalId, ServiceScope, TypeName};

use crate::error::ClientError;
use crate::source::{ManifestEntry, ManifestSource, RemoteResource, ServiceMetadata};

/// Header row of the manifest CSV stream.
const MANIFEST_HEADER: &str = "global_id,fingerprint";

/// Per-request timeout. A hung manifest fetch surfaces as a transport error
/// instead of blocking the run indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking manifest client over a shared [`ureq::Agent`].
pub struct HttpManifestClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpManifestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self { base_url, agent }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

impl ManifestSource for HttpManifestClient {
    fn service_metadata(&self) -> Result<ServiceMetadata, ClientError> {
        let url = self.url("service-index/metadata/");
        let response = self.agent.get(&url).call().map_err(|e| transport(&url, e))?;
        response
            .into_json::<ServiceMetadata>()
            .map_err(|e| decode(&url, e))
    }

    fn list_resource_types(&self) -> Result<Vec<TypeName>, ClientError> {
        #[derive(Deserialize)]
        struct TypeRow {
            name: TypeName,
        }

        let url = self.url("resource-types/");
        let response = self.agent.get(&url).call().map_err(|e| transport(&url, e))?;
        let rows: Vec<TypeRow> = response.into_json().map_err(|e| decode(&url, e))?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }

    fn get_manifest(
        &self,
        resource_type: &TypeName,
        scope: &ServiceScope,
    ) -> Result<Option<Vec<ManifestEntry>>, ClientError> {
        let url = self.url(&format!("resource-types/{resource_type}/manifest/"));
        match self
            .agent
            .get(&url)
            .query("service_id", &scope.to_string())
            .call()
        {
            Ok(response) => {
                let body = response.into_string().map_err(|e| decode(&url, e))?;
                let entries = parse_manifest(&body)?;
                tracing::debug!(
                    "manifest for {resource_type}: {} entries (scope {scope})",
                    entries.len()
                );
                Ok(Some(entries))
            }
            // 404 means the server publishes no manifest for this type — a
            // soft condition the executor reports and skips past.
            Err(ureq::Error::Status(404, _)) => {
                tracing::debug!("no manifest published for {resource_type}");
                Ok(None)
            }
            Err(ureq::Error::Status(status, _)) => Err(ClientError::ManifestUnavailable {
                type_name: resource_type.clone(),
                status,
            }),
            Err(err) => Err(transport(&url, err)),
        }
    }

    fn get_resource(&self, global_id: &GlobalId) -> Result<RemoteResource, ClientError> {
        let url = self.url(&format!("resources/{global_id}/"));
        match self.agent.get(&url).call() {
            Ok(response) => response.into_json().map_err(|e| decode(&url, e)),
            Err(ureq::Error::Status(404, _)) => Err(ClientError::NotFound {
                global_id: global_id.clone(),
            }),
            Err(err) => Err(transport(&url, err)),
        }
    }
}

/// Parse a manifest CSV body into entries.
///
/// The first row may be the `global_id,fingerprint` header; blank lines are
/// ignored. Anything else that does not split into two non-empty fields is a
/// malformed row.
pub fn parse_manifest(body: &str) -> Result<Vec<ManifestEntry>, ClientError> {
    let mut entries = Vec::new();
    let mut first = true;
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if first {
            first = false;
            if line == MANIFEST_HEADER {
                continue;
            }
        }
        let Some((global_id, fingerprint)) = line.split_once(',') else {
            return Err(ClientError::MalformedManifest {
                line: line.to_string(),
            });
        };
        if global_id.is_empty() || fingerprint.is_empty() {
            return Err(ClientError::MalformedManifest {
                line: line.to_string(),
            });
        }
        entries.push(ManifestEntry {
            global_id: GlobalId::from(global_id),
            fingerprint: fingerprint.to_string(),
        });
    }
    Ok(entries)
}

fn transport(url: &str, source: ureq::Error) -> ClientError {
    ClientError::Transport {
        url: url.to_string(),
        source: Box::new(source),
    }
}

fn decode(url: &str, source: std::io::Error) -> ClientError {
    ClientError::Decode {
        url: url.to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
