//! # Error Module
//!
//! Error types for the media sweeper engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, patterns, what went wrong
//! - **Isolate failures** - a single unreadable file or changed path must
//!   never abort the rest of a run; those are recorded per-file or per
//!   operation, not raised here

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum SweepError {
    /// Invalid argument rejected before any walking begins
    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Fingerprinting error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),
}

/// Errors that occur while walking the tree
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read entry {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that exclude a single file from fingerprinting
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No capture timestamp in {path}; cannot fingerprint by metadata")]
    MissingCapturedAt { path: PathBuf },
}

/// Errors while building a plan
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Two operations target the same destination: {path}")]
    DestinationConflict { path: PathBuf },

    #[error("Path {path} is outside the scan root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, SweepError>;
