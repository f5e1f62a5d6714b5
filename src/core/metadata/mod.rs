//! # Metadata Module
//!
//! Extracts EXIF attributes from media files: capture timestamp, GPS
//! position and camera model.
//!
//! The extractor never fails past this boundary: absent or corrupt
//! metadata yields empty fields, matching the tolerant contract required
//! of the engine's external collaborators. EXIF is typically present in
//! JPEG/TIFF/HEIC; other formats simply come back empty.

use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::core::walker::FileRecord;

/// A GPS position decoded from EXIF rationals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Attributes extracted from a media file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Original capture date/time (DateTimeOriginal, then Digitized,
    /// then plain DateTime)
    pub captured_at: Option<NaiveDateTime>,
    /// GPS position, if the file carries one
    pub geolocation: Option<GeoPoint>,
    /// Camera model string
    pub camera_model: Option<String>,
}

impl MediaMetadata {
    /// Whether anything was extracted at all.
    pub fn has_data(&self) -> bool {
        self.captured_at.is_some() || self.geolocation.is_some() || self.camera_model.is_some()
    }
}

/// Extract EXIF metadata from a file. Returns empty metadata on any error.
pub fn extract_metadata(path: &Path) -> MediaMetadata {
    let mut metadata = MediaMetadata::default();

    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return metadata,
    };
    let mut reader = BufReader::new(&file);
    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(r) => r,
        Err(_) => return metadata,
    };

    for tag in [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime] {
        if metadata.captured_at.is_some() {
            break;
        }
        if let Some(field) = exif.get_field(tag, In::PRIMARY) {
            metadata.captured_at = ascii_value(&field.value).and_then(|s| parse_exif_datetime(&s));
        }
    }

    if let Some(field) = exif.get_field(Tag::Model, In::PRIMARY) {
        metadata.camera_model = ascii_value(&field.value);
    }

    metadata.geolocation = extract_gps(&exif);
    metadata
}

/// Fill in `record.metadata` for every record in parallel on a bounded pool.
///
/// Each extraction opens exactly one file, so `workers` also bounds the
/// concurrently open file handles.
pub fn enrich_records(records: &mut [FileRecord], workers: usize) {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();
    match pool {
        Ok(pool) => pool.install(|| {
            records.par_iter_mut().for_each(|record| {
                record.metadata = Some(extract_metadata(&record.path));
            });
        }),
        // Pool construction can only fail on resource exhaustion; fall
        // back to sequential extraction rather than giving up.
        Err(_) => {
            for record in records.iter_mut() {
                record.metadata = Some(extract_metadata(&record.path));
            }
        }
    }
}

fn extract_gps(exif: &exif::Exif) -> Option<GeoPoint> {
    let lat = dms_degrees(&exif.get_field(Tag::GPSLatitude, In::PRIMARY)?.value)?;
    let lon = dms_degrees(&exif.get_field(Tag::GPSLongitude, In::PRIMARY)?.value)?;
    let lat_ref = ascii_value(&exif.get_field(Tag::GPSLatitudeRef, In::PRIMARY)?.value)?;
    let lon_ref = ascii_value(&exif.get_field(Tag::GPSLongitudeRef, In::PRIMARY)?.value)?;

    let lat = if lat_ref.eq_ignore_ascii_case("S") { -lat } else { lat };
    let lon = if lon_ref.eq_ignore_ascii_case("W") { -lon } else { lon };
    Some(GeoPoint { lat, lon })
}

/// Degrees/minutes/seconds rationals to decimal degrees.
fn dms_degrees(value: &Value) -> Option<f64> {
    if let Value::Rational(parts) = value {
        if parts.len() >= 3 {
            let d = parts[0].to_f64();
            let m = parts[1].to_f64();
            let s = parts[2].to_f64();
            return Some(d + m / 60.0 + s / 3600.0);
        }
    }
    None
}

/// EXIF timestamps come as "YYYY:MM:DD HH:MM:SS", occasionally with
/// dashes instead of colons in the date part.
fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    None
}

fn ascii_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metadata_has_no_data() {
        assert!(!MediaMetadata::default().has_data());
    }

    #[test]
    fn parses_standard_exif_timestamp() {
        let dt = parse_exif_datetime("2023:03:14 09:26:53").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2023-03-14 09:26:53");
    }

    #[test]
    fn parses_dashed_timestamp_variant() {
        assert!(parse_exif_datetime("2023-03-14 09:26:53").is_some());
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(parse_exif_datetime("not a date").is_none());
    }

    #[test]
    fn extract_from_nonexistent_returns_empty() {
        let meta = extract_metadata(Path::new("/nonexistent/file.jpg"));
        assert!(!meta.has_data());
    }

    #[test]
    fn extract_from_non_exif_bytes_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"not an image at all").unwrap();
        assert!(!extract_metadata(&path).has_data());
    }
}
