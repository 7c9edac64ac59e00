//! Subcommand implementations.

pub mod diff;
pub mod sync;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};

use converge_core::types::{ServiceId, ServiceScope};

/// Store directory: the explicit flag, or `~/.converge/resources`.
pub(crate) fn resolve_store_root(store: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = store {
        return Ok(root);
    }
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(converge_core::store::default_root(&home))
}

/// `--service-id` flag: `all` bypasses scoping, anything else is an id.
/// Absent defers to the remote authority's own identifier.
pub(crate) fn parse_scope(service_id: Option<String>) -> Option<ServiceScope> {
    service_id.map(|value| {
        if value == "all" {
            ServiceScope::All
        } else {
            ServiceScope::Service(ServiceId::from(value))
        }
    })
}
