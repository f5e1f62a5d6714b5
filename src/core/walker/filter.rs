//! File selection logic for the tree walker.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind of media a file holds, judged by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    /// Classify a path by its extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e.to_lowercase(),
            None => return MediaKind::Other,
        };
        if IMAGE_EXTS.contains(ext.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTS.contains(ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, MediaKind::Other)
    }
}

const IMAGE_EXT_LIST: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "tif", "tiff", "bmp", "heic", "heif", "gif",
];

const VIDEO_EXT_LIST: &[&str] = &["mp4", "mov", "m4v", "mkv", "avi", "wmv", "3gp", "webm"];

struct ExtSet(&'static [&'static str]);

impl ExtSet {
    fn contains(&self, ext: &str) -> bool {
        self.0.contains(&ext)
    }
}

static IMAGE_EXTS: ExtSet = ExtSet(IMAGE_EXT_LIST);
static VIDEO_EXTS: ExtSet = ExtSet(VIDEO_EXT_LIST);

/// Which files the walker should record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Every regular file (cleanup commands match junk by name)
    All,
    /// Only recognized image/video files (dedup, rename, sort)
    #[default]
    MediaOnly,
}

/// Decides whether a file belongs in the walk result.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include_hidden: bool,
    selection: Selection,
    extra_extensions: HashSet<String>,
}

impl FileFilter {
    pub fn new(selection: Selection) -> Self {
        Self {
            include_hidden: false,
            selection,
            extra_extensions: HashSet::new(),
        }
    }

    /// Include entries whose name starts with a dot.
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Treat additional extensions as media (lowercase, no dot).
    pub fn with_extra_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extra_extensions = extensions.into_iter().collect();
        self
    }

    /// Check whether a file should be recorded.
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && is_hidden(path) {
            return false;
        }
        match self.selection {
            Selection::All => true,
            Selection::MediaOnly => {
                if MediaKind::from_path(path).is_media() {
                    return true;
                }
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| self.extra_extensions.contains(&e.to_lowercase()))
                    .unwrap_or(false)
            }
        }
    }
}

/// Whether the final component starts with a dot.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
