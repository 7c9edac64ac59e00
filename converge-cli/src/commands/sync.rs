//! `converge sync` — converge the local store with the remote manifest.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use converge_client::HttpManifestClient;
use converge_core::types::TypeName;
use converge_core::{FileStore, TypeRegistry};
use converge_engine::{MemorySink, ReportSink, StdoutSink, SyncExecutor, SyncOptions, SyncResult};

use super::{parse_scope, resolve_store_root};

/// Arguments for `converge sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Base URL of the resource server.
    #[arg(long)]
    pub server: String,

    /// Service scope: a service id, or "all" to bypass scoping
    /// (defaults to the remote authority's own identifier).
    #[arg(long)]
    pub service_id: Option<String>,

    /// Resource type to sync (repeatable; defaults to every published type).
    #[arg(long = "type", value_name = "NAME")]
    pub types: Vec<String>,

    /// Directory holding the local resource store
    /// (defaults to ~/.converge/resources).
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Emit the machine-readable run result as JSON instead of report lines.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_store_root(self.store)?;
        let registry = TypeRegistry::builtin();
        let mut store = FileStore::open(root, registry.clone());
        let client = HttpManifestClient::new(&self.server);

        let resource_type_names = if self.types.is_empty() {
            None
        } else {
            Some(self.types.into_iter().map(TypeName::from).collect())
        };
        let options = SyncOptions {
            resource_type_names,
            scope: parse_scope(self.service_id),
        };

        let mut stdout_sink = StdoutSink;
        let mut memory_sink = MemorySink::default();
        let sink: &mut dyn ReportSink = if self.json {
            &mut memory_sink
        } else {
            &mut stdout_sink
        };

        let result = SyncExecutor::new(&client, &mut store, &registry, sink, options)
            .run()
            .context("sync failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("failed to serialize run result")?
            );
        } else {
            print_summary(&result);
        }
        Ok(())
    }
}

fn print_summary(result: &SyncResult) {
    println!(
        "{} {} created, {} updated, {} deleted, {} unchanged, {} errors",
        "✓".green(),
        result.created.len(),
        result.updated.len(),
        result.deleted.len(),
        result.noop.len(),
        result.errors.len(),
    );
    for failure in &result.errors {
        let subject = failure
            .global_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} {}: {}",
            "✗".red(),
            failure.operation,
            subject,
            failure.message
        );
    }
}
