//! `converge diff` — show what sync would change without writing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use converge_client::{HttpManifestClient, ManifestSource};
use converge_core::types::{ServiceScope, TypeName};
use converge_core::{FileStore, TypeRegistry};
use converge_engine::{preview_type, PlannedChange, TypePreview};

use super::{parse_scope, resolve_store_root};

/// Arguments for `converge diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Base URL of the resource server.
    #[arg(long)]
    pub server: String,

    /// Service scope: a service id, or "all" to bypass scoping.
    #[arg(long)]
    pub service_id: Option<String>,

    /// Resource type to preview (repeatable; defaults to every published type).
    #[arg(long = "type", value_name = "NAME")]
    pub types: Vec<String>,

    /// Directory holding the local resource store.
    #[arg(long)]
    pub store: Option<PathBuf>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_store_root(self.store)?;
        let registry = TypeRegistry::builtin();
        let store = FileStore::open(root, registry.clone());
        let client = HttpManifestClient::new(&self.server);

        let scope = match parse_scope(self.service_id) {
            Some(scope) => scope,
            None => ServiceScope::Service(
                client
                    .service_metadata()
                    .context("failed to fetch service metadata")?
                    .service_id,
            ),
        };
        let type_names: Vec<TypeName> = if self.types.is_empty() {
            client
                .list_resource_types()
                .context("failed to list resource types")?
        } else {
            self.types.into_iter().map(TypeName::from).collect()
        };

        for type_name in &type_names {
            let preview = preview_type(&client, &store, &registry, type_name, &scope)
                .with_context(|| format!("diff failed for '{type_name}'"))?;
            print_preview(&preview);
        }
        Ok(())
    }
}

fn print_preview(preview: &TypePreview) {
    if !preview.manifest_found {
        println!("manifest for {} NOT FOUND.", preview.type_name);
        return;
    }
    if preview.changes.is_empty() {
        println!("{} '{}' — nothing to do", "✓".green(), preview.type_name);
        return;
    }

    for change in &preview.changes {
        match change {
            PlannedChange::Create { global_id, label } => {
                println!("{} would create {global_id} {label}", "+".green());
            }
            PlannedChange::Update {
                global_id,
                label,
                adopted,
                unified_diff,
            } => {
                let verb = if *adopted { "would adopt" } else { "would update" };
                println!("{} {verb} {global_id} {label}", "~".yellow());
                print!("{unified_diff}");
            }
            PlannedChange::Delete { global_id, label } => {
                println!("{} would delete {global_id} {label}", "-".red());
            }
            PlannedChange::Conflict { global_id, message } => {
                println!("{} conflict {global_id}: {message}", "!".red());
            }
        }
    }
}
