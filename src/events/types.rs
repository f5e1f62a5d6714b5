//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the sweeper engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Tree walking phase events
    Scan(ScanEvent),
    /// Fingerprinting phase events
    Fingerprint(FingerprintEvent),
    /// Plan execution events
    Apply(ApplyEvent),
}

/// Events during the walking phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Walking has started
    Started { roots: Vec<PathBuf> },
    /// Progress update while walking
    Progress(ScanProgress),
    /// An entry could not be read; the walk continues
    Error { path: PathBuf, message: String },
    /// Walking completed
    Completed { total_files: usize },
}

/// Progress information while walking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Directories visited so far
    pub directories_visited: usize,
    /// Files recorded so far
    pub files_found: usize,
    /// Directory currently being read
    pub current_path: PathBuf,
}

/// Events during the fingerprinting phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FingerprintEvent {
    /// Fingerprinting has started
    Started { total_files: usize },
    /// Progress update
    Progress(FingerprintProgress),
    /// A file was excluded (unreadable or missing metadata); the run continues
    Skipped { path: PathBuf, message: String },
    /// Fingerprinting completed
    Completed { fingerprinted: usize, skipped: usize },
}

/// Progress information while fingerprinting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintProgress {
    /// Files fingerprinted so far
    pub completed: usize,
    /// Total files queued
    pub total: usize,
    /// File currently being hashed
    pub current_path: PathBuf,
}

/// Events during plan execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApplyEvent {
    /// Execution has started
    Started { total_operations: usize },
    /// Progress update
    Progress(ApplyProgress),
    /// An operation was skipped because its precondition no longer holds
    OperationSkipped { path: PathBuf, reason: String },
    /// An operation failed with an I/O error; execution continues
    OperationFailed { path: PathBuf, message: String },
    /// Execution completed
    Completed {
        succeeded: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Progress information while applying
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyProgress {
    /// Operations attempted so far
    pub completed: usize,
    /// Total operations in the plan
    pub total: usize,
    /// Source path of the current operation
    pub current_path: PathBuf,
}
