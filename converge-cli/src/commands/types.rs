//! `converge types` — list resource types published by the server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use converge_client::{HttpManifestClient, ManifestSource};
use converge_core::types::ServiceScope;
use converge_core::{FileStore, ResourceStore, TypeRegistry};

use super::resolve_store_root;

/// Arguments for `converge types`.
#[derive(Args, Debug)]
pub struct TypesArgs {
    /// Base URL of the resource server.
    #[arg(long)]
    pub server: String,

    /// Directory holding the local resource store.
    #[arg(long)]
    pub store: Option<PathBuf>,
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "type")]
    name: String,
    #[tabled(rename = "local resources")]
    local: usize,
    #[tabled(rename = "registered")]
    registered: &'static str,
}

impl TypesArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_store_root(self.store)?;
        let registry = TypeRegistry::builtin();
        let store = FileStore::open(root, registry.clone());
        let client = HttpManifestClient::new(&self.server);

        let names = client
            .list_resource_types()
            .context("failed to list resource types")?;
        if names.is_empty() {
            println!("No resource types published.");
            return Ok(());
        }

        let mut rows = Vec::new();
        for name in &names {
            let local = store
                .list(name, &ServiceScope::All)
                .with_context(|| format!("failed to read local resources for '{name}'"))?
                .len();
            rows.push(TypeRow {
                name: name.to_string(),
                local,
                registered: if registry.get(name).is_some() { "yes" } else { "no" },
            });
        }

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
