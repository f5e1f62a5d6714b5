//! # Tree Walker
//!
//! Enumerates regular files under one or more roots and snapshots their
//! stable attributes. The walk is read-only; unreadable entries are
//! recorded as errors and never abort the traversal.
//!
//! When symlinks are followed the walker keeps a device/inode identity
//! set of every directory it enters and skips revisits, so each physical
//! file is recorded exactly once no matter how many link paths lead to
//! it. (`walkdir` alone only breaks ancestor loops; sibling links to one
//! directory would otherwise each produce their own records.)

mod filter;

pub use filter::{is_hidden, FileFilter, MediaKind, Selection};

use crate::core::metadata::MediaMetadata;
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent, ScanProgress};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Immutable snapshot of a file taken once per run.
///
/// Plans are computed against these records; the filesystem is only
/// consulted again during apply-time precondition checks.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path at snapshot time
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Media classification by extension
    pub media: MediaKind,
    /// EXIF-derived attributes; `None` until enriched by the metadata
    /// extractor (only commands that need capture times pay for it)
    pub metadata: Option<MediaMetadata>,
}

impl FileRecord {
    /// File name as a lossy string, for ordering and display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Configuration for a walk
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Which files to record
    pub selection: Selection,
    /// Extensions recorded in addition to the built-in media set
    pub extra_extensions: Vec<String>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: false,
            max_depth: None,
            selection: Selection::MediaOnly,
            extra_extensions: Vec::new(),
        }
    }
}

/// Result of a walk: the file snapshot plus every directory seen.
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Recorded files, in traversal order
    pub records: Vec<FileRecord>,
    /// Every directory visited below the roots (the roots themselves are
    /// excluded); used for empty-directory pruning and folder removal
    pub directories: Vec<PathBuf>,
    /// Non-fatal errors encountered along the way
    pub errors: Vec<ScanError>,
}

/// Walks directory trees and snapshots file attributes.
pub struct TreeWalker {
    config: WalkConfig,
    filter: FileFilter,
}

impl TreeWalker {
    pub fn new(config: WalkConfig) -> Self {
        let filter = FileFilter::new(config.selection)
            .with_hidden(config.include_hidden)
            .with_extra_extensions(config.extra_extensions.clone());
        Self { config, filter }
    }

    /// Walk the given roots without progress reporting.
    pub fn walk(&self, roots: &[PathBuf]) -> WalkResult {
        self.walk_with_events(roots, &crate::events::null_sender())
    }

    /// Walk the given roots, emitting [`ScanEvent`]s as the walk proceeds.
    pub fn walk_with_events(&self, roots: &[PathBuf], events: &EventSender) -> WalkResult {
        events.send(Event::Scan(ScanEvent::Started {
            roots: roots.to_vec(),
        }));

        let mut result = WalkResult::default();
        for root in roots {
            self.walk_root(root, events, &mut result);
        }

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: result.records.len(),
        }));
        result
    }

    fn walk_root(&self, root: &Path, events: &EventSender, result: &mut WalkResult) {
        if !root.is_dir() {
            let error = ScanError::RootNotFound {
                path: root.to_path_buf(),
            };
            events.send(Event::Scan(ScanEvent::Error {
                path: root.to_path_buf(),
                message: error.to_string(),
            }));
            result.errors.push(error);
            return;
        }

        let mut directories_visited = 0usize;
        let mut visited = VisitedDirs::default();
        if self.config.follow_symlinks {
            visited.insert(root);
        }

        // Sorted traversal keeps snapshots, and therefore plans, stable
        // across runs over an unchanged tree.
        let mut walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut it = walker.into_iter();
        while let Some(entry_result) = it.next() {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    let error = match e.io_error().map(|io| io.kind()) {
                        Some(std::io::ErrorKind::PermissionDenied) => {
                            ScanError::PermissionDenied { path: path.clone() }
                        }
                        _ => ScanError::ReadEntry {
                            path: path.clone(),
                            source: std::io::Error::other(e.to_string()),
                        },
                    };
                    events.send(Event::Scan(ScanEvent::Error {
                        path,
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                    continue;
                }
            };

            let path = entry.path();

            if entry.file_type().is_dir() {
                if path == root {
                    continue;
                }
                // A hidden directory is pruned wholesale; skipping the
                // entry alone would still descend into it.
                if !self.config.include_hidden && is_hidden(path) {
                    it.skip_current_dir();
                    continue;
                }
                // Two link paths to one physical directory must not
                // record its files twice: a dedup plan built from such
                // phantom duplicates would delete the only real copy.
                if self.config.follow_symlinks && !visited.insert(path) {
                    it.skip_current_dir();
                    continue;
                }
                directories_visited += 1;
                result.directories.push(path.to_path_buf());
                events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                    directories_visited,
                    files_found: result.records.len(),
                    current_path: path.to_path_buf(),
                })));
                continue;
            }

            if !entry.file_type().is_file() || !self.filter.should_include(path) {
                continue;
            }

            match fs::metadata(path) {
                Ok(meta) => {
                    result.records.push(FileRecord {
                        path: path.to_path_buf(),
                        size: meta.len(),
                        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                        media: MediaKind::from_path(path),
                        metadata: None,
                    });
                }
                Err(e) => {
                    let error = ScanError::ReadEntry {
                        path: path.to_path_buf(),
                        source: e,
                    };
                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.to_path_buf(),
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                }
            }
        }
    }
}

/// Device/inode identity set of directories already entered.
#[derive(Default)]
struct VisitedDirs(HashSet<(u64, u64)>);

impl VisitedDirs {
    /// Record a directory; returns false if it was entered before.
    fn insert(&mut self, path: &Path) -> bool {
        match dir_identity(path) {
            Some(id) => self.0.insert(id),
            // Without an identity there is nothing to compare; let the
            // traversal proceed rather than dropping the directory.
            None => true,
        }
    }
}

#[cfg(unix)]
fn dir_identity(path: &Path) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).ok().map(|m| (m.dev(), m.ino()))
}

#[cfg(not(unix))]
fn dir_identity(_path: &Path) -> Option<(u64, u64)> {
    None
}
