//! # Fingerprint Engine
//!
//! Computes an identity key per file under a selected strategy.
//!
//! - `content`: streaming BLAKE3 over the full byte stream; memory use is
//!   a fixed chunk buffer regardless of file size.
//! - `metadata`: a `(size, captured_at, camera_model)` tuple; cheaper but
//!   blind to identical bytes carrying different capture metadata.
//!
//! Hashing runs in parallel on a dedicated pool whose size bounds the
//! number of concurrently open files. Unreadable files are excluded from
//! grouping and reported, never fatal.

use blake3::Hasher;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::config::EngineConfig;
use crate::core::walker::FileRecord;
use crate::error::FingerprintError;
use crate::events::{Event, EventSender, FingerprintEvent, FingerprintProgress};

/// Fixed read-buffer size for streaming hashes and byte comparison.
const CHUNK_SIZE: usize = 1024 * 1024;

/// How file identity is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Cryptographic hash of the file contents
    Content,
    /// Size + capture timestamp + camera model
    Metadata,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Content => write!(f, "content"),
            Strategy::Metadata => write!(f, "metadata"),
        }
    }
}

/// The value used to test file equivalence under a strategy.
///
/// Two records are duplicates iff their keys under the active strategy
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Content([u8; 32]),
    Metadata {
        size: u64,
        captured_at: NaiveDateTime,
        camera_model: Option<String>,
    },
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityKey::Content(bytes) => {
                for b in &bytes[..8] {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            IdentityKey::Metadata {
                size, captured_at, ..
            } => write!(f, "{}b@{}", size, captured_at.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Outcome of fingerprinting a snapshot: keys paired with record indices,
/// plus the files that had to be excluded.
#[derive(Debug, Default)]
pub struct FingerprintSet {
    /// `(index into the record slice, key)` in record order
    pub keys: Vec<(usize, IdentityKey)>,
    /// Excluded files with the reason, reported in the run summary
    pub skipped: Vec<(std::path::PathBuf, String)>,
}

/// Computes identity keys for file snapshots.
pub struct FingerprintEngine {
    config: EngineConfig,
}

impl FingerprintEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fingerprint a single record. Pure given the file's bytes/metadata
    /// at call time.
    pub fn fingerprint(
        &self,
        record: &FileRecord,
        strategy: Strategy,
    ) -> Result<IdentityKey, FingerprintError> {
        match strategy {
            Strategy::Content => {
                let hash = hash_file(&record.path).map_err(|source| {
                    FingerprintError::Unreadable {
                        path: record.path.clone(),
                        source,
                    }
                })?;
                Ok(IdentityKey::Content(hash))
            }
            Strategy::Metadata => {
                let meta = record.metadata.clone().unwrap_or_default();
                let captured_at =
                    meta.captured_at
                        .ok_or_else(|| FingerprintError::MissingCapturedAt {
                            path: record.path.clone(),
                        })?;
                Ok(IdentityKey::Metadata {
                    size: record.size,
                    captured_at,
                    camera_model: meta.camera_model,
                })
            }
        }
    }

    /// Fingerprint every record in parallel, preserving record order in
    /// the output. Failures exclude the file and are reported via events
    /// and in [`FingerprintSet::skipped`].
    pub fn fingerprint_all(
        &self,
        records: &[FileRecord],
        strategy: Strategy,
        events: &EventSender,
    ) -> FingerprintSet {
        events.send(Event::Fingerprint(FingerprintEvent::Started {
            total_files: records.len(),
        }));

        let completed = AtomicUsize::new(0);
        let run = |records: &[FileRecord]| -> Vec<(usize, Result<IdentityKey, FingerprintError>)> {
            records
                .par_iter()
                .enumerate()
                .map(|(i, record)| {
                    let outcome = self.fingerprint(record, strategy);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    events.send(Event::Fingerprint(FingerprintEvent::Progress(
                        FingerprintProgress {
                            completed: done,
                            total: records.len(),
                            current_path: record.path.clone(),
                        },
                    )));
                    (i, outcome)
                })
                .collect()
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build();
        let mut outcomes = match pool {
            Ok(pool) => pool.install(|| run(records)),
            Err(_) => run(records),
        };
        outcomes.sort_by_key(|(i, _)| *i);

        let mut set = FingerprintSet::default();
        for (i, outcome) in outcomes {
            match outcome {
                Ok(key) => set.keys.push((i, key)),
                Err(e) => {
                    let message = e.to_string();
                    events.send(Event::Fingerprint(FingerprintEvent::Skipped {
                        path: records[i].path.clone(),
                        message: message.clone(),
                    }));
                    set.skipped.push((records[i].path.clone(), message));
                }
            }
        }

        events.send(Event::Fingerprint(FingerprintEvent::Completed {
            fingerprinted: set.keys.len(),
            skipped: set.skipped.len(),
        }));
        set
    }
}

/// Streaming BLAKE3 of a whole file using a fixed-size chunk buffer.
fn hash_file(path: &Path) -> std::io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(*hasher.finalize().as_bytes())
}

/// Byte-for-byte comparison in fixed-size chunks.
///
/// Used as the collision safeguard before a delete destroys data: files
/// already share a 256-bit hash, so one extra sequential read is cheap
/// relative to what a false positive would cost.
pub fn files_identical(a: &Path, b: &Path) -> std::io::Result<bool> {
    let mut fa = File::open(a)?;
    let mut fb = File::open(b)?;
    if fa.metadata()?.len() != fb.metadata()?.len() {
        return Ok(false);
    }
    let mut ba = vec![0u8; CHUNK_SIZE];
    let mut bb = vec![0u8; CHUNK_SIZE];
    loop {
        let na = read_full(&mut fa, &mut ba)?;
        let nb = read_full(&mut fb, &mut bb)?;
        if na != nb || ba[..na] != bb[..nb] {
            return Ok(false);
        }
        if na == 0 {
            return Ok(true);
        }
    }
}

/// Read until the buffer is full or EOF.
fn read_full(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::MediaMetadata;
    use crate::core::walker::MediaKind;
    use crate::events::null_sender;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn record_for(path: &Path) -> FileRecord {
        let meta = fs::metadata(path).unwrap();
        FileRecord {
            path: path.to_path_buf(),
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            media: MediaKind::from_path(path),
            metadata: None,
        }
    }

    #[test]
    fn identical_bytes_share_a_content_key() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.jpg");
        let b = temp.path().join("b.jpg");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        let engine = FingerprintEngine::new(EngineConfig::default());
        let ka = engine.fingerprint(&record_for(&a), Strategy::Content).unwrap();
        let kb = engine.fingerprint(&record_for(&b), Strategy::Content).unwrap();
        assert_eq!(ka, kb);
    }

    #[test]
    fn different_bytes_get_different_content_keys() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.jpg");
        let b = temp.path().join("b.jpg");
        fs::write(&a, b"first").unwrap();
        fs::write(&b, b"second").unwrap();

        let engine = FingerprintEngine::new(EngineConfig::default());
        let ka = engine.fingerprint(&record_for(&a), Strategy::Content).unwrap();
        let kb = engine.fingerprint(&record_for(&b), Strategy::Content).unwrap();
        assert_ne!(ka, kb);
    }

    #[test]
    fn metadata_strategy_requires_captured_at() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.jpg");
        fs::write(&a, b"bytes").unwrap();

        let engine = FingerprintEngine::new(EngineConfig::default());
        let mut record = record_for(&a);
        record.metadata = Some(MediaMetadata::default());
        let err = engine.fingerprint(&record, Strategy::Metadata);
        assert!(matches!(err, Err(FingerprintError::MissingCapturedAt { .. })));
    }

    #[test]
    fn fingerprint_all_excludes_unreadable_files() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.jpg");
        fs::write(&a, b"bytes").unwrap();
        let mut records = vec![record_for(&a)];
        // A record whose file vanished between snapshot and hashing.
        records.push(FileRecord {
            path: temp.path().join("vanished.jpg"),
            size: 0,
            modified: SystemTime::UNIX_EPOCH,
            media: MediaKind::Image,
            metadata: None,
        });

        let engine = FingerprintEngine::new(EngineConfig::default());
        let set = engine.fingerprint_all(&records, Strategy::Content, &null_sender());

        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.skipped.len(), 1);
        assert!(set.skipped[0].0.ends_with("vanished.jpg"));
    }

    #[test]
    fn files_identical_detects_equality_and_difference() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        let c = temp.path().join("c");
        fs::write(&a, b"payload").unwrap();
        fs::write(&b, b"payload").unwrap();
        fs::write(&c, b"payloae").unwrap();

        assert!(files_identical(&a, &b).unwrap());
        assert!(!files_identical(&a, &c).unwrap());
    }

    #[test]
    fn fingerprint_all_preserves_record_order() {
        let temp = TempDir::new().unwrap();
        let mut records = Vec::new();
        for i in 0..8 {
            let p = temp.path().join(format!("{i}.jpg"));
            fs::write(&p, format!("content-{i}")).unwrap();
            records.push(record_for(&p));
        }

        let engine = FingerprintEngine::new(EngineConfig::default());
        let set = engine.fingerprint_all(&records, Strategy::Content, &null_sender());
        let indices: Vec<usize> = set.keys.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }
}
