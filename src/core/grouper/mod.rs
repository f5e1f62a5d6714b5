//! # Duplicate Grouper
//!
//! Partitions file records by identity key and picks one canonical member
//! per group. Grouping is a pure function of the snapshot: the same
//! records and keys always yield the same groups and the same canonical
//! member, which makes re-runs idempotent and assertions predictable.

use std::collections::HashMap;

use crate::core::fingerprint::{FingerprintSet, IdentityKey};
use crate::core::walker::FileRecord;

/// A set of files considered equivalent under the active strategy.
///
/// Members are held in canonical order: the member to keep first, then
/// the rest. Groups always have at least two members.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub key: IdentityKey,
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// The member kept in place; all others are deletion/relocation
    /// candidates.
    pub fn canonical(&self) -> &FileRecord {
        &self.members[0]
    }

    /// Every member except the canonical one.
    pub fn duplicates(&self) -> &[FileRecord] {
        &self.members[1..]
    }

    /// Bytes reclaimed if all duplicates were removed.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.duplicates().iter().map(|r| r.size).sum()
    }
}

/// Fixed canonical order: earliest modification time, then shortest path,
/// then lexicographic path.
fn canonical_order(a: &FileRecord, b: &FileRecord) -> std::cmp::Ordering {
    a.modified
        .cmp(&b.modified)
        .then_with(|| {
            a.path
                .as_os_str()
                .len()
                .cmp(&b.path.as_os_str().len())
        })
        .then_with(|| a.path.cmp(&b.path))
}

/// Group records by identity key, dropping singletons.
///
/// Groups come back ordered by their canonical member's path so output is
/// stable across runs.
pub fn group(records: &[FileRecord], set: &FingerprintSet) -> Vec<DuplicateGroup> {
    let mut buckets: HashMap<&IdentityKey, Vec<usize>> = HashMap::new();
    for (index, key) in &set.keys {
        buckets.entry(key).or_default().push(*index);
    }

    let mut groups = Vec::new();
    for (key, indices) in buckets {
        if indices.len() < 2 {
            continue;
        }
        let mut members: Vec<FileRecord> =
            indices.iter().map(|&i| records[i].clone()).collect();
        members.sort_by(canonical_order);
        groups.push(DuplicateGroup {
            key: key.clone(),
            members,
        });
    }

    groups.sort_by(|a, b| a.canonical().path.cmp(&b.canonical().path));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::walker::MediaKind;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    fn record(path: &str, modified_offset_secs: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size: 10,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(modified_offset_secs),
            media: MediaKind::Image,
            metadata: None,
        }
    }

    fn keyed(records: &[FileRecord], keys: Vec<(usize, IdentityKey)>) -> Vec<DuplicateGroup> {
        let set = FingerprintSet {
            keys,
            skipped: Vec::new(),
        };
        group(records, &set)
    }

    fn content_key(byte: u8) -> IdentityKey {
        IdentityKey::Content([byte; 32])
    }

    #[test]
    fn singletons_are_dropped() {
        let records = vec![record("/m/a.jpg", 1), record("/m/b.jpg", 2)];
        let keys = vec![(0, content_key(1)), (1, content_key(2))];
        assert!(keyed(&records, keys).is_empty());
    }

    #[test]
    fn earliest_modified_wins_canonical() {
        let records = vec![
            record("/m/late.jpg", 300),
            record("/m/early.jpg", 100),
            record("/m/mid.jpg", 200),
        ];
        let keys = vec![
            (0, content_key(7)),
            (1, content_key(7)),
            (2, content_key(7)),
        ];
        let groups = keyed(&records, keys);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical().path, PathBuf::from("/m/early.jpg"));
        assert_eq!(groups[0].duplicates().len(), 2);
    }

    #[test]
    fn path_length_breaks_modified_ties() {
        let records = vec![
            record("/m/deeper/copy.jpg", 100),
            record("/m/a.jpg", 100),
        ];
        let keys = vec![(0, content_key(9)), (1, content_key(9))];
        let groups = keyed(&records, keys);
        assert_eq!(groups[0].canonical().path, PathBuf::from("/m/a.jpg"));
    }

    #[test]
    fn lexicographic_path_is_the_last_tiebreak() {
        let records = vec![record("/m/b.jpg", 100), record("/m/a.jpg", 100)];
        let keys = vec![(0, content_key(3)), (1, content_key(3))];
        let groups = keyed(&records, keys);
        assert_eq!(groups[0].canonical().path, PathBuf::from("/m/a.jpg"));
    }

    #[test]
    fn grouping_is_deterministic_across_runs() {
        let records = vec![
            record("/m/c.jpg", 50),
            record("/m/a.jpg", 50),
            record("/m/b.jpg", 50),
            record("/m/z.jpg", 10),
            record("/m/y.jpg", 20),
        ];
        let keys = vec![
            (0, content_key(1)),
            (1, content_key(1)),
            (2, content_key(1)),
            (3, content_key(2)),
            (4, content_key(2)),
        ];
        let first = keyed(&records, keys.clone());
        let second = keyed(&records, keys);
        let canon =
            |gs: &[DuplicateGroup]| gs.iter().map(|g| g.canonical().path.clone()).collect::<Vec<_>>();
        assert_eq!(canon(&first), canon(&second));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn reclaimable_bytes_excludes_canonical() {
        let records = vec![record("/m/a.jpg", 1), record("/m/b.jpg", 2)];
        let keys = vec![(0, content_key(4)), (1, content_key(4))];
        let groups = keyed(&records, keys);
        assert_eq!(groups[0].reclaimable_bytes(), 10);
    }
}
