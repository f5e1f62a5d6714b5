//! Sequential plan execution with per-operation precondition checks.
//!
//! Operations run in plan order. Before each one the executor re-checks
//! the filesystem: if the world changed since planning (source gone,
//! destination occupied, directory no longer empty) the operation is
//! skipped, not failed. I/O errors fail that one operation and execution
//! continues, so a single locked file never aborts a whole run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::PlanError;
use crate::events::{ApplyEvent, ApplyProgress, Event, EventSender};

use super::{OpKind, Operation, Plan};

/// One operation that was skipped because its precondition no longer held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSkip {
    pub kind: OpKind,
    pub path: PathBuf,
    pub reason: String,
}

/// One operation that failed with an I/O error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationFailure {
    pub kind: OpKind,
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of applying a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplySummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub skips: Vec<OperationSkip>,
    pub failures: Vec<OperationFailure>,
    pub duration_ms: u64,
}

impl ApplySummary {
    /// True when nothing failed (skips are not failures).
    pub fn ok(&self) -> bool {
        self.failed == 0
    }
}

/// Applies a verified [`Plan`] to the filesystem.
pub struct PlanExecutor;

impl PlanExecutor {
    /// Execute every operation in order, reporting progress through
    /// `events`. Returns an error only if the plan itself is internally
    /// inconsistent; individual operation failures end up in the summary.
    pub fn execute(plan: &Plan, events: &EventSender) -> Result<ApplySummary, PlanError> {
        plan.verify()?;

        let started = Instant::now();
        let total = plan.len();
        tracing::info!(command = %plan.command, operations = total, "applying plan");
        events.send(Event::Apply(ApplyEvent::Started {
            total_operations: total,
        }));

        let mut summary = ApplySummary::default();
        let mut created_dirs: HashSet<PathBuf> = HashSet::new();

        for (index, op) in plan.ops.iter().enumerate() {
            match Self::run_one(op, &mut created_dirs) {
                Outcome::Done => summary.succeeded += 1,
                Outcome::Skipped(reason) => {
                    tracing::debug!(path = %op.source.display(), %reason, "skipped");
                    events.send(Event::Apply(ApplyEvent::OperationSkipped {
                        path: op.source.clone(),
                        reason: reason.clone(),
                    }));
                    summary.skipped += 1;
                    summary.skips.push(OperationSkip {
                        kind: op.kind,
                        path: op.source.clone(),
                        reason,
                    });
                }
                Outcome::Failed(message) => {
                    tracing::warn!(path = %op.source.display(), %message, "operation failed");
                    events.send(Event::Apply(ApplyEvent::OperationFailed {
                        path: op.source.clone(),
                        message: message.clone(),
                    }));
                    summary.failed += 1;
                    summary.failures.push(OperationFailure {
                        kind: op.kind,
                        path: op.source.clone(),
                        message,
                    });
                }
            }
            events.send(Event::Apply(ApplyEvent::Progress(ApplyProgress {
                completed: index + 1,
                total,
                current_path: op.source.clone(),
            })));
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "apply finished"
        );
        events.send(Event::Apply(ApplyEvent::Completed {
            succeeded: summary.succeeded,
            skipped: summary.skipped,
            failed: summary.failed,
        }));
        Ok(summary)
    }

    fn run_one(op: &Operation, created_dirs: &mut HashSet<PathBuf>) -> Outcome {
        match op.kind {
            OpKind::CreateDir => {
                if op.source.is_dir() {
                    return Outcome::Skipped("directory already exists".to_string());
                }
                match fs::create_dir_all(&op.source) {
                    Ok(()) => {
                        created_dirs.insert(op.source.clone());
                        Outcome::Done
                    }
                    Err(e) => Outcome::Failed(e.to_string()),
                }
            }
            OpKind::Delete => {
                let meta = match fs::symlink_metadata(&op.source) {
                    Ok(m) => m,
                    Err(_) => return Outcome::Skipped("source no longer exists".to_string()),
                };
                let result = if meta.is_dir() {
                    fs::remove_dir_all(&op.source)
                } else {
                    fs::remove_file(&op.source)
                };
                match result {
                    Ok(()) => Outcome::Done,
                    Err(e) => Outcome::Failed(e.to_string()),
                }
            }
            OpKind::RemoveEmptyDir => {
                if !op.source.is_dir() {
                    return Outcome::Skipped("directory no longer exists".to_string());
                }
                match fs::read_dir(&op.source) {
                    Ok(mut entries) => {
                        if entries.next().is_some() {
                            return Outcome::Skipped("directory not empty".to_string());
                        }
                    }
                    Err(e) => return Outcome::Failed(e.to_string()),
                }
                match fs::remove_dir(&op.source) {
                    Ok(()) => Outcome::Done,
                    Err(e) => Outcome::Failed(e.to_string()),
                }
            }
            OpKind::Rename | OpKind::Move | OpKind::Copy => {
                let dest = match &op.dest {
                    Some(dest) => dest,
                    None => return Outcome::Failed("operation has no destination".to_string()),
                };
                if fs::symlink_metadata(&op.source).is_err() {
                    return Outcome::Skipped("source no longer exists".to_string());
                }
                if dest.exists() {
                    return Outcome::Skipped("destination occupied".to_string());
                }
                if let Err(e) = ensure_parent(dest, created_dirs) {
                    return Outcome::Failed(e.to_string());
                }
                let result = match op.kind {
                    OpKind::Rename => fs::rename(&op.source, dest).map_err(|e| e.to_string()),
                    OpKind::Move => transfer(&op.source, dest, true),
                    OpKind::Copy => transfer(&op.source, dest, false),
                    _ => unreachable!(),
                };
                match result {
                    Ok(()) => Outcome::Done,
                    Err(message) => Outcome::Failed(message),
                }
            }
        }
    }
}

enum Outcome {
    Done,
    Skipped(String),
    Failed(String),
}

fn ensure_parent(dest: &Path, created_dirs: &mut HashSet<PathBuf>) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        if !created_dirs.contains(parent) && !parent.is_dir() {
            fs::create_dir_all(parent)?;
            created_dirs.insert(parent.to_path_buf());
        }
    }
    Ok(())
}

/// Copy `source` to `dest` with a size check; when `remove_source` is set
/// a same-filesystem rename is tried first and the copied file is removed
/// only after the sizes agree. An incomplete destination is cleaned up.
fn transfer(source: &Path, dest: &Path, remove_source: bool) -> Result<(), String> {
    if remove_source && fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    let expected = fs::metadata(source).map_err(|e| e.to_string())?.len();
    let written = fs::copy(source, dest).map_err(|e| e.to_string())?;
    if written != expected {
        let _ = fs::remove_file(dest);
        return Err(format!(
            "size mismatch after copy: wrote {} of {} bytes",
            written, expected
        ));
    }
    if remove_source {
        fs::remove_file(source).map_err(|e| {
            format!("copied but could not remove source: {}", e)
        })?;
    }
    Ok(())
}
