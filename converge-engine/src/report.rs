//! Run report — line-oriented progress sink plus the machine-readable
//! result handed back to the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use converge_core::types::{GlobalId, TypeName};

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Line-oriented progress/result stream.
///
/// The executor emits one line per CREATE/UPDATE/DELETE/NOOP/ERROR as it
/// happens, an orphan announcement before deletions, and a per-type summary.
pub trait ReportSink {
    fn line(&mut self, text: &str);
}

/// Prints report lines to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn line(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Collects report lines in memory; used by tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
}

impl ReportSink for MemorySink {
    fn line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}

impl MemorySink {
    /// Whether an exact line was emitted.
    pub fn contains(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }

    /// Whether any emitted line contains `needle`.
    pub fn any_contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// The operation a failure was recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Lookup,
    Fetch,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Lookup => "lookup",
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One recorded per-entry failure.
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    /// Absent when the failure was not tied to a single manifest entry.
    pub global_id: Option<GlobalId>,
    pub operation: Operation,
    pub message: String,
}

/// Machine-readable outcome of one sync run.
///
/// Every manifest entry lands in exactly one of created/updated/noop/errors;
/// every orphan in exactly one of deleted/errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub created: BTreeMap<GlobalId, String>,
    pub updated: BTreeMap<GlobalId, String>,
    pub deleted: BTreeMap<GlobalId, String>,
    pub noop: BTreeSet<GlobalId>,
    pub errors: Vec<SyncFailure>,
}

impl SyncResult {
    /// Number of applied mutations (creates + updates + deletes).
    pub fn changed(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

// ---------------------------------------------------------------------------
// Per-type counters
// ---------------------------------------------------------------------------

/// Counters for one resource type, folded into the summary line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TypeCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl TypeCounts {
    pub(crate) fn summary(&self, type_name: &TypeName) -> String {
        format!(
            "{type_name}: Created {} | Updated {} | Deleted {} | Skipped {} | Errors {}",
            self.created, self.updated, self.deleted, self.skipped, self.errors,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_collects_lines() {
        let mut sink = MemorySink::default();
        sink.line("CREATED abc theceo");
        sink.line("NOOP def");

        assert_eq!(sink.lines.len(), 2);
        assert!(sink.contains("NOOP def"));
        assert!(!sink.contains("NOOP"));
        assert!(sink.any_contains("CREATED abc"));
    }

    #[test]
    fn summary_line_carries_every_count() {
        let counts = TypeCounts {
            created: 2,
            updated: 1,
            deleted: 3,
            skipped: 4,
            errors: 1,
        };
        let line = counts.summary(&TypeName::from("shared.user"));
        assert_eq!(
            line,
            "shared.user: Created 2 | Updated 1 | Deleted 3 | Skipped 4 | Errors 1"
        );
    }

    #[test]
    fn operation_display_is_lowercase() {
        assert_eq!(Operation::Create.to_string(), "create");
        assert_eq!(Operation::Delete.to_string(), "delete");
    }

    #[test]
    fn changed_counts_mutations_only() {
        let mut result = SyncResult::default();
        result.created.insert(GlobalId::from("a"), "a".to_string());
        result.updated.insert(GlobalId::from("b"), "b".to_string());
        result.noop.insert(GlobalId::from("c"));
        assert_eq!(result.changed(), 2);
    }
}
