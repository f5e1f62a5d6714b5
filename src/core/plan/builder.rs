//! Per-command plan builders.
//!
//! Every builder translates one command's intent into the shared
//! [`Operation`]/[`Plan`] types against a single in-memory snapshot; none
//! of them re-walks the filesystem mid-build, and none of them mutates
//! anything. Destination allocation happens here so the executor can stay
//! command-agnostic.

use regex::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::fingerprint::files_identical;
use crate::core::grouper::DuplicateGroup;
use crate::core::naming::{self, LocationResolver, SortStrategy, UniqueNamer};
use crate::core::walker::{FileRecord, WalkResult};
use crate::error::{PlanError, Result, SweepError};

use super::{Operation, Plan};

/// Whether `sort` mirrors by copying or relocates destructively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorMode {
    /// Copy files into the destination tree, keeping sources
    #[default]
    Copy,
    /// Move files, removing them from the source tree
    Move,
}

/// Build a dedup plan: every non-canonical member becomes a delete, or a
/// move into `quarantine` preserving its path relative to `root`. The
/// canonical member is never touched.
///
/// When `verify_bytes` is set and the plan deletes, each duplicate is
/// byte-compared against its canonical member first; mismatches and
/// unreadable members are excluded and noted rather than destroyed.
pub fn dedup_plan(
    root: &Path,
    groups: &[DuplicateGroup],
    quarantine: Option<&Path>,
    verify_bytes: bool,
) -> Result<Plan> {
    let mut plan = Plan::new(root.to_path_buf(), "dedup run");
    let mut planned_dests: HashSet<PathBuf> = HashSet::new();
    let mut needed_dirs: BTreeSet<PathBuf> = BTreeSet::new();
    let mut moves: Vec<Operation> = Vec::new();
    let mut namer = UniqueNamer::new();

    for group in groups {
        let canonical = group.canonical();
        for dup in group.duplicates() {
            match quarantine {
                None => {
                    if verify_bytes {
                        match files_identical(&canonical.path, &dup.path) {
                            Ok(true) => {}
                            Ok(false) => {
                                plan.note(format!(
                                    "excluded {}: bytes differ from {} despite matching key",
                                    dup.path.display(),
                                    canonical.path.display()
                                ));
                                continue;
                            }
                            Err(e) => {
                                plan.note(format!(
                                    "excluded {}: verification failed ({})",
                                    dup.path.display(),
                                    e
                                ));
                                continue;
                            }
                        }
                    }
                    plan.push(Operation::delete(
                        dup.path.clone(),
                        format!("duplicate of {}", canonical.path.display()),
                    ));
                }
                Some(quarantine) => {
                    let relative = dup.path.strip_prefix(root).map_err(|_| {
                        SweepError::Plan(PlanError::OutsideRoot {
                            path: dup.path.clone(),
                            root: root.to_path_buf(),
                        })
                    })?;
                    let wanted = quarantine.join(relative);
                    let dest = namer.allocate(&wanted, |p| {
                        planned_dests.contains(p) || p.exists()
                    });
                    if let Some(parent) = dest.parent() {
                        if !parent.is_dir() {
                            needed_dirs.insert(parent.to_path_buf());
                        }
                    }
                    planned_dests.insert(dest.clone());
                    moves.push(Operation::mv(
                        dup.path.clone(),
                        dest,
                        format!("duplicate of {}", canonical.path.display()),
                    ));
                }
            }
        }
    }

    // BTreeSet order puts parents before their children.
    for dir in needed_dirs {
        plan.push(Operation::create_dir(dir));
    }
    for op in moves {
        plan.push(op);
    }

    plan.verify()?;
    Ok(plan)
}

/// Build a junk-removal plan: delete files whose *name* matches any of
/// the patterns (case-insensitive), optionally followed by
/// remove-empty-dir operations for directories the deletions leave empty.
pub fn remove_files_plan(
    root: &Path,
    walk: &WalkResult,
    patterns: &[String],
    prune_empty: bool,
) -> Result<Plan> {
    if patterns.is_empty() {
        return Err(SweepError::Validation(
            "at least one pattern is required".to_string(),
        ));
    }
    let compiled = compile_patterns(patterns, true)?;

    let mut plan = Plan::new(root.to_path_buf(), "cleanup remove-files");
    let mut deleted: HashSet<&Path> = HashSet::new();

    for record in &walk.records {
        let name = record.file_name();
        if let Some(pattern) = compiled.iter().find(|rx| rx.is_match(&name)) {
            deleted.insert(&record.path);
            plan.push(Operation::delete(
                record.path.clone(),
                format!("name matches /{}/", pattern.as_str()),
            ));
        }
    }

    if prune_empty {
        for dir in simulate_empty_dirs(root, walk, &deleted) {
            plan.push(Operation::remove_empty_dir(dir));
        }
    }

    plan.verify()?;
    Ok(plan)
}

/// Directories that would hold no entries once the given files are gone,
/// deepest first so each removal sees its children already handled.
fn simulate_empty_dirs(
    root: &Path,
    walk: &WalkResult,
    deleted: &HashSet<&Path>,
) -> Vec<PathBuf> {
    let mut files_by_dir: HashMap<&Path, Vec<&Path>> = HashMap::new();
    for record in &walk.records {
        if let Some(parent) = record.path.parent() {
            files_by_dir.entry(parent).or_default().push(&record.path);
        }
    }
    let mut dirs_by_parent: HashMap<&Path, Vec<&Path>> = HashMap::new();
    for dir in &walk.directories {
        if let Some(parent) = dir.parent() {
            dirs_by_parent.entry(parent).or_default().push(dir);
        }
    }

    let mut ordered: Vec<&PathBuf> = walk.directories.iter().collect();
    ordered.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    let mut empty: HashSet<&Path> = HashSet::new();
    let mut result = Vec::new();
    for dir in ordered {
        if dir.as_path() == root {
            continue;
        }
        let files_survive = files_by_dir
            .get(dir.as_path())
            .map(|files| files.iter().any(|f| !deleted.contains(*f)))
            .unwrap_or(false);
        let subdirs_survive = dirs_by_parent
            .get(dir.as_path())
            .map(|subs| subs.iter().any(|d| !empty.contains(*d)))
            .unwrap_or(false);
        if !files_survive && !subdirs_survive {
            empty.insert(dir.as_path());
            result.push(dir.clone());
        }
    }
    result
}

/// Build a folder-removal plan: one recursive delete per outermost
/// directory whose name matches (case-insensitive). Nothing is emitted
/// for entries underneath a removed directory.
pub fn remove_folders_plan(root: &Path, walk: &WalkResult, names: &[String]) -> Result<Plan> {
    if names.is_empty() {
        return Err(SweepError::Validation(
            "at least one folder name is required".to_string(),
        ));
    }
    let wanted: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();

    let mut plan = Plan::new(root.to_path_buf(), "cleanup remove-folders");
    let mut targets: Vec<&PathBuf> = walk
        .directories
        .iter()
        .filter(|dir| {
            dir.file_name()
                .and_then(|n| n.to_str())
                .map(|n| wanted.contains(&n.to_lowercase()))
                .unwrap_or(false)
        })
        .collect();
    targets.sort();

    let mut accepted: Vec<&PathBuf> = Vec::new();
    for target in targets {
        if accepted.iter().any(|a| target.starts_with(a)) {
            continue;
        }
        accepted.push(target);
        plan.push(Operation::delete(
            target.clone(),
            "matched folder name (recursive)".to_string(),
        ));
    }

    plan.verify()?;
    Ok(plan)
}

/// Read-only report of files whose name stem matches `suffix_pattern`
/// (e.g. a `_dupe(n)` marker left by a previous quarantine run). Never
/// produces an applyable plan.
pub fn find_marked_dupes(walk: &WalkResult, suffix_pattern: &str) -> Result<Vec<PathBuf>> {
    let rx = Regex::new(suffix_pattern).map_err(|e| {
        SweepError::Plan(PlanError::InvalidPattern {
            pattern: suffix_pattern.to_string(),
            reason: e.to_string(),
        })
    })?;

    Ok(walk
        .records
        .iter()
        .filter(|record| {
            record
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|stem| rx.is_match(stem))
                .unwrap_or(false)
        })
        .map(|record| record.path.clone())
        .collect())
}

/// Build a sequential-rename plan, one sequence per directory.
///
/// Rename operations are ordered so that no destination collides with a
/// still-pending source; genuine swap cycles are broken by routing one
/// member through a staging name.
pub fn rename_plan(root: &Path, records: &[FileRecord], zero_pad: usize) -> Result<Plan> {
    let mut plan = Plan::new(root.to_path_buf(), "cleanup rename");

    let mut by_dir: HashMap<&Path, Vec<FileRecord>> = HashMap::new();
    for record in records {
        if let Some(parent) = record.path.parent() {
            by_dir.entry(parent).or_default().push(record.clone());
        }
    }
    let mut dirs: Vec<&Path> = by_dir.keys().copied().collect();
    dirs.sort();

    for dir in dirs {
        let files = &by_dir[dir];
        let pairs = naming::sequence_names(dir, files, zero_pad);
        for op in order_renames(pairs) {
            plan.push(op);
        }
    }

    plan.verify()?;
    Ok(plan)
}

/// Order rename pairs so every destination is free by the time its
/// operation runs; break permutation cycles with a staged intermediate.
fn order_renames(pairs: Vec<(PathBuf, PathBuf)>) -> Vec<Operation> {
    let mut remaining = pairs;
    let mut pending_sources: HashSet<PathBuf> =
        remaining.iter().map(|(src, _)| src.clone()).collect();
    let mut ops = Vec::new();

    while !remaining.is_empty() {
        if let Some(pos) = remaining
            .iter()
            .position(|(_, dst)| !pending_sources.contains(dst))
        {
            let (src, dst) = remaining.remove(pos);
            pending_sources.remove(&src);
            ops.push(Operation::rename(src, dst, "sequential name"));
        } else {
            // Every destination is someone else's source: a swap cycle.
            let (src, dst) = remaining.remove(0);
            let stage = stage_path(&src);
            pending_sources.remove(&src);
            pending_sources.insert(stage.clone());
            ops.push(Operation::rename(src, stage.clone(), "stage for swap"));
            remaining.push((stage, dst));
        }
    }
    ops
}

/// Sibling staging name that cannot collide with planned sequences.
fn stage_path(src: &Path) -> PathBuf {
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let tag = Uuid::new_v4().simple().to_string();
    src.with_file_name(format!("{}.swap-{}", name, &tag[..8]))
}

/// Build a sort plan: create-directory operations for missing buckets
/// followed by one move (or copy, in mirror mode) per file, mirroring the
/// source tree into `dst_root`. Files already at their computed
/// destination produce no operation.
pub fn sort_plan(
    root: &Path,
    dst_root: &Path,
    records: &[FileRecord],
    strategy: SortStrategy,
    resolver: &dyn LocationResolver,
    mode: MirrorMode,
) -> Result<Plan> {
    let mut plan = Plan::new(root.to_path_buf(), format!("cleanup sort ({})", strategy));
    let mut planned_dests: HashSet<PathBuf> = HashSet::new();
    let mut needed_dirs: BTreeSet<PathBuf> = BTreeSet::new();
    let mut transfers: Vec<Operation> = Vec::new();
    let mut namer = UniqueNamer::new();

    for record in records {
        let relative = naming::sort_destination(record, strategy, resolver);
        let wanted = dst_root.join(&relative);
        if wanted == record.path {
            continue;
        }
        // The suffix is reserved for a *distinct* occupant. A destination
        // already holding this file's bytes (a previous mirror run) needs
        // no operation, which is what keeps re-runs empty.
        if !planned_dests.contains(&wanted) && already_mirrored(record, &wanted) {
            continue;
        }
        let dest = namer.allocate(&wanted, |p| {
            planned_dests.contains(p) || (p != record.path && p.exists())
        });
        if let Some(parent) = dest.parent() {
            if !parent.is_dir() {
                needed_dirs.insert(parent.to_path_buf());
            }
        }
        planned_dests.insert(dest.clone());
        let reason = format!("sort {}", strategy);
        transfers.push(match mode {
            MirrorMode::Copy => Operation::copy(record.path.clone(), dest, reason),
            MirrorMode::Move => Operation::mv(record.path.clone(), dest, reason),
        });
    }

    for dir in needed_dirs {
        plan.push(Operation::create_dir(dir));
    }
    for op in transfers {
        plan.push(op);
    }

    plan.verify()?;
    Ok(plan)
}

/// Whether `dest` already holds exactly this record's bytes. Size first;
/// the byte compare only runs on a size match. Unreadable destinations
/// count as distinct so the collision suffix still protects them.
fn already_mirrored(record: &FileRecord, dest: &Path) -> bool {
    match fs::metadata(dest) {
        Ok(meta) if meta.is_file() && meta.len() == record.size => {
            files_identical(&record.path, dest).unwrap_or(false)
        }
        _ => false,
    }
}

/// Compile user patterns. Plain substrings work because regex treats most
/// literals as themselves; invalid syntax is a validation-time error.
fn compile_patterns(patterns: &[String], case_insensitive: bool) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| {
                    SweepError::Plan(PlanError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
                })
        })
        .collect()
}
