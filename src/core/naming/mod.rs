//! # Naming Allocator
//!
//! Generates collision-free destination names for the rename and sort
//! commands.
//!
//! Sequential renames reset per directory: images become
//! `IMG_000001.JPG` ordered by capture time, videos become
//! `VID_000001.MP4` with one sequence per container format. Files that
//! already carry their assigned name produce no pair, which is what makes
//! a second run a no-op.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::metadata::GeoPoint;
use crate::core::walker::{FileRecord, MediaKind};

/// Destination layout strategy for `sort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    /// `YYYY/MM/` buckets from the capture timestamp
    ByDate,
    /// Buckets from the file's geolocation, `Unknown` when absent
    ByLocation,
}

impl std::fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortStrategy::ByDate => write!(f, "by_date"),
            SortStrategy::ByLocation => write!(f, "by_location"),
        }
    }
}

/// Maps a GPS position to a destination folder name.
///
/// Reverse geocoding is an external collaborator; embedders can supply a
/// resolver backed by a real geocoder. The engine only requires that the
/// mapping be deterministic for a given position.
pub trait LocationResolver: Send + Sync {
    /// Folder name for a position, or `None` to fall back to `Unknown`.
    fn bucket(&self, point: &GeoPoint) -> Option<String>;
}

/// Default resolver: a 0.1-degree coordinate grid, e.g. `48.8N_2.3E`.
///
/// Coarse on purpose: nearby shots land in the same folder without any
/// network dependency.
#[derive(Debug, Default)]
pub struct GridResolver;

impl LocationResolver for GridResolver {
    fn bucket(&self, point: &GeoPoint) -> Option<String> {
        if !point.lat.is_finite() || !point.lon.is_finite() {
            return None;
        }
        let ns = if point.lat < 0.0 { 'S' } else { 'N' };
        let ew = if point.lon < 0.0 { 'W' } else { 'E' };
        Some(format!(
            "{:.1}{}_{:.1}{}",
            point.lat.abs(),
            ns,
            point.lon.abs(),
            ew
        ))
    }
}

/// Bucket used when location data is absent or unresolvable.
pub const UNKNOWN_BUCKET: &str = "Unknown";

/// Capture time with a stable fallback to the filesystem mtime.
pub fn taken_or_modified(record: &FileRecord) -> NaiveDateTime {
    record
        .metadata
        .as_ref()
        .and_then(|m| m.captured_at)
        .unwrap_or_else(|| DateTime::<Utc>::from(record.modified).naive_utc())
}

/// Sequential canonical names for one directory (non-recursive).
///
/// Images are ordered by capture time (tie-break: lowercase original
/// name) and share one sequence; videos get one sequence per extension,
/// ordered by modification time. Returns `(source, assigned name)` pairs
/// only where the name differs.
pub fn sequence_names(dir: &Path, files: &[FileRecord], zero_pad: usize) -> Vec<(PathBuf, PathBuf)> {
    let mut pairs = Vec::new();

    let mut images: Vec<&FileRecord> = files
        .iter()
        .filter(|r| r.media == MediaKind::Image)
        .collect();
    images.sort_by(|a, b| {
        taken_or_modified(a)
            .cmp(&taken_or_modified(b))
            .then_with(|| a.file_name().to_lowercase().cmp(&b.file_name().to_lowercase()))
    });
    assign(dir, &images, "IMG", zero_pad, &mut pairs);

    // Videos keep one sequence per container format.
    let mut by_ext: HashMap<String, Vec<&FileRecord>> = HashMap::new();
    for record in files.iter().filter(|r| r.media == MediaKind::Video) {
        let ext = record
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        by_ext.entry(ext).or_default().push(record);
    }
    let mut exts: Vec<_> = by_ext.keys().cloned().collect();
    exts.sort();
    for ext in exts {
        let mut group = by_ext.remove(&ext).unwrap();
        group.sort_by(|a, b| {
            taken_or_modified(a)
                .cmp(&taken_or_modified(b))
                .then_with(|| a.file_name().to_lowercase().cmp(&b.file_name().to_lowercase()))
        });
        assign(dir, &group, "VID", zero_pad, &mut pairs);
    }

    pairs
}

fn assign(
    dir: &Path,
    ordered: &[&FileRecord],
    prefix: &str,
    zero_pad: usize,
    pairs: &mut Vec<(PathBuf, PathBuf)>,
) {
    for (idx, record) in ordered.iter().enumerate() {
        let ext = record
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_uppercase();
        let name = format!("{}_{:0width$}.{}", prefix, idx + 1, ext, width = zero_pad);
        if record.file_name() == name {
            continue;
        }
        pairs.push((record.path.clone(), dir.join(name)));
    }
}

/// Destination path for `sort`, relative to the destination root.
pub fn sort_destination(
    record: &FileRecord,
    strategy: SortStrategy,
    resolver: &dyn LocationResolver,
) -> PathBuf {
    let bucket = match strategy {
        SortStrategy::ByDate => {
            let taken = taken_or_modified(record);
            PathBuf::from(format!("{}", taken.year())).join(format!("{:02}", taken.month()))
        }
        SortStrategy::ByLocation => {
            let name = record
                .metadata
                .as_ref()
                .and_then(|m| m.geolocation)
                .and_then(|point| resolver.bucket(&point))
                .unwrap_or_else(|| UNKNOWN_BUCKET.to_string());
            PathBuf::from(sanitize_component(&name))
        }
    };
    bucket.join(record.file_name())
}

/// Keep bucket names safe as single path components.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        UNKNOWN_BUCKET.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Allocates a free path when a distinct file already occupies the
/// computed destination, by appending `_{n}` before the extension.
///
/// The per-pattern counter keeps allocation O(1) when many files share a
/// name; `is_taken` covers both planned destinations and what already
/// exists on disk.
pub struct UniqueNamer {
    counters: HashMap<String, usize>,
}

impl UniqueNamer {
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }

    pub fn allocate(&mut self, wanted: &Path, mut is_taken: impl FnMut(&Path) -> bool) -> PathBuf {
        if !is_taken(wanted) {
            return wanted.to_path_buf();
        }
        let stem = wanted
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file");
        let ext = wanted.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parent = wanted.parent().unwrap_or_else(|| Path::new(""));
        let pattern_key = format!("{}:{}:{}", parent.display(), stem, ext);
        let counter = self.counters.entry(pattern_key).or_insert(1);

        loop {
            let name = if ext.is_empty() {
                format!("{}_{}", stem, counter)
            } else {
                format!("{}_{}.{}", stem, counter, ext)
            };
            *counter += 1;
            let candidate = parent.join(name);
            if !is_taken(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for UniqueNamer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::MediaMetadata;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::time::SystemTime;

    fn image(dir: &str, name: &str, captured: NaiveDateTime) -> FileRecord {
        FileRecord {
            path: PathBuf::from(dir).join(name),
            size: 1,
            modified: SystemTime::UNIX_EPOCH,
            media: MediaKind::from_path(Path::new(name)),
            metadata: Some(MediaMetadata {
                captured_at: Some(captured),
                geolocation: None,
                camera_model: None,
            }),
        }
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn images_are_sequenced_chronologically() {
        let dir = Path::new("/m/album");
        let files = vec![
            image("/m/album", "zzz.jpg", at(2023, 5, 3)),
            image("/m/album", "aaa.jpg", at(2023, 5, 9)),
            image("/m/album", "mmm.jpg", at(2023, 5, 1)),
        ];
        let pairs = sequence_names(dir, &files, 6);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], (PathBuf::from("/m/album/mmm.jpg"), PathBuf::from("/m/album/IMG_000001.JPG")));
        assert_eq!(pairs[1], (PathBuf::from("/m/album/zzz.jpg"), PathBuf::from("/m/album/IMG_000002.JPG")));
        assert_eq!(pairs[2], (PathBuf::from("/m/album/aaa.jpg"), PathBuf::from("/m/album/IMG_000003.JPG")));
    }

    #[test]
    fn correctly_named_files_produce_no_pairs() {
        let dir = Path::new("/m/album");
        let files = vec![
            image("/m/album", "IMG_000001.JPG", at(2023, 1, 1)),
            image("/m/album", "IMG_000002.JPG", at(2023, 1, 2)),
        ];
        assert!(sequence_names(dir, &files, 6).is_empty());
    }

    #[test]
    fn videos_sequence_per_extension() {
        let dir = Path::new("/m/clips");
        let mut a = image("/m/clips", "a.mp4", at(2023, 1, 1));
        a.media = MediaKind::Video;
        let mut b = image("/m/clips", "b.mov", at(2023, 1, 2));
        b.media = MediaKind::Video;
        let mut c = image("/m/clips", "c.mp4", at(2023, 1, 3));
        c.media = MediaKind::Video;

        let pairs = sequence_names(dir, &[a, b, c], 6);
        let names: HashSet<String> = pairs
            .iter()
            .map(|(_, dst)| dst.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains("VID_000001.MOV"));
        assert!(names.contains("VID_000001.MP4"));
        assert!(names.contains("VID_000002.MP4"));
    }

    #[test]
    fn by_date_buckets_use_year_and_zero_padded_month() {
        let record = image("/m/in", "shot.jpg", at(2023, 3, 14));
        let dest = sort_destination(&record, SortStrategy::ByDate, &GridResolver);
        assert_eq!(dest, PathBuf::from("2023/03/shot.jpg"));
    }

    #[test]
    fn by_location_falls_back_to_unknown() {
        let record = image("/m/in", "shot.jpg", at(2023, 3, 14));
        let dest = sort_destination(&record, SortStrategy::ByLocation, &GridResolver);
        assert_eq!(dest, PathBuf::from("Unknown/shot.jpg"));
    }

    #[test]
    fn grid_resolver_buckets_coordinates() {
        let point = GeoPoint { lat: 48.8566, lon: 2.3522 };
        assert_eq!(GridResolver.bucket(&point).unwrap(), "48.9N_2.4E");
        let sw = GeoPoint { lat: -33.87, lon: -151.21 };
        assert_eq!(GridResolver.bucket(&sw).unwrap(), "33.9S_151.2W");
    }

    #[test]
    fn unique_namer_appends_deterministic_suffixes() {
        let taken: HashSet<PathBuf> = [
            PathBuf::from("/out/2024/photo.jpg"),
            PathBuf::from("/out/2024/photo_1.jpg"),
        ]
        .into_iter()
        .collect();

        let mut namer = UniqueNamer::new();
        let got = namer.allocate(Path::new("/out/2024/photo.jpg"), |p| taken.contains(p));
        assert_eq!(got, PathBuf::from("/out/2024/photo_2.jpg"));
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_component("Rio/Brazil"), "Rio_Brazil");
        assert_eq!(sanitize_component("   "), "Unknown");
    }
}
