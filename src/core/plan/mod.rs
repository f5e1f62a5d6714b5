//! # Plan Module
//!
//! Value types for filesystem mutation plans, the per-command builders
//! and the executor.
//!
//! A [`Plan`] is an ordered, conflict-free list of [`Operation`]s computed
//! against one in-memory snapshot. Building a plan never mutates the
//! filesystem; only [`executor::PlanExecutor::execute`] does, and it
//! re-validates every operation's precondition first.

pub mod builder;
pub mod executor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::PlanError;

/// What an operation does to the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Remove a file, or a directory subtree for folder cleanup
    Delete,
    /// Relocate a file; source is gone afterwards
    Move,
    /// Duplicate a file; source is kept (mirror mode of `sort`)
    Copy,
    /// Rename within a directory
    Rename,
    /// Create a destination directory (with parents)
    CreateDir,
    /// Remove a directory that the same plan leaves empty
    RemoveEmptyDir,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OpKind::Delete => "delete",
            OpKind::Move => "move",
            OpKind::Copy => "copy",
            OpKind::Rename => "rename",
            OpKind::CreateDir => "create-dir",
            OpKind::RemoveEmptyDir => "remove-empty-dir",
        };
        f.write_str(s)
    }
}

/// A single intended filesystem mutation. Pure value object; building or
/// holding one has no side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpKind,
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    /// Human-readable justification shown in plan listings
    pub reason: String,
}

impl Operation {
    pub fn delete(source: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Delete,
            source,
            dest: None,
            reason: reason.into(),
        }
    }

    pub fn mv(source: PathBuf, dest: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Move,
            source,
            dest: Some(dest),
            reason: reason.into(),
        }
    }

    pub fn copy(source: PathBuf, dest: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Copy,
            source,
            dest: Some(dest),
            reason: reason.into(),
        }
    }

    pub fn rename(source: PathBuf, dest: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Rename,
            source,
            dest: Some(dest),
            reason: reason.into(),
        }
    }

    pub fn create_dir(path: PathBuf) -> Self {
        Self {
            kind: OpKind::CreateDir,
            source: path,
            dest: None,
            reason: "destination bucket".to_string(),
        }
    }

    pub fn remove_empty_dir(path: PathBuf) -> Self {
        Self {
            kind: OpKind::RemoveEmptyDir,
            source: path,
            dest: None,
            reason: "empty after deletions".to_string(),
        }
    }
}

/// An ordered, conflict-free list of intended mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    /// Root scope the plan was computed over
    pub root: PathBuf,
    /// Command that produced the plan (for listings and logs)
    pub command: String,
    pub generated_at: DateTime<Utc>,
    pub ops: Vec<Operation>,
    /// Non-fatal notes gathered while building (excluded files, skipped
    /// members); surfaced alongside the listing
    pub notes: Vec<String>,
}

impl Plan {
    pub fn new(root: PathBuf, command: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            root,
            command: command.into(),
            generated_at: Utc::now(),
            ops: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Verify the internal conflict-freedom invariant: no two operations
    /// may target the same destination path.
    ///
    /// Collisions against paths the plan leaves untouched are prevented
    /// at build time (builders allocate against a taken-set seeded from
    /// the snapshot) and re-checked per operation during apply.
    pub fn verify(&self) -> Result<(), PlanError> {
        let mut destinations: HashSet<&PathBuf> = HashSet::new();
        for op in &self.ops {
            let target = match op.kind {
                OpKind::Move | OpKind::Copy | OpKind::Rename => op.dest.as_ref(),
                // CreateDir targets may legitimately repeat only if the
                // builder failed to deduplicate them; treat that as a
                // conflict too.
                OpKind::CreateDir => Some(&op.source),
                OpKind::Delete | OpKind::RemoveEmptyDir => None,
            };
            if let Some(path) = target {
                if !destinations.insert(path) {
                    return Err(PlanError::DestinationConflict { path: path.clone() });
                }
            }
        }
        Ok(())
    }

    /// Human-readable ordered listing with a trailing summary count.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "plan {} ({}) over {}",
            self.id,
            self.command,
            self.root.display()
        );
        for op in &self.ops {
            match &op.dest {
                Some(dest) => {
                    let _ = writeln!(
                        out,
                        "  {:<16} {} -> {}  [{}]",
                        op.kind.to_string(),
                        op.source.display(),
                        dest.display(),
                        op.reason
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  {:<16} {}  [{}]",
                        op.kind.to_string(),
                        op.source.display(),
                        op.reason
                    );
                }
            }
        }
        for note in &self.notes {
            let _ = writeln!(out, "  note: {}", note);
        }
        let _ = writeln!(out, "{} operation(s)", self.ops.len());
        out
    }
}
