use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "m4v", "mov", "avi", "wmv", "ts", "m2ts", "mts", "webm",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub min_size: u64,
    pub video_only: bool,
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub mtime_ns: u64,
}

pub fn is_video(p: &Path) -> bool {
    has_extension(p, VIDEO_EXTENSIONS)
}

pub fn has_extension(p: &Path, extensions: &[&str]) -> bool {
    p.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Regular files under `root` passing the filters, keyed and ordered by path.
/// Unreadable entries are logged and skipped.
pub fn collect_files(root: &Path, options: &ScanOptions) -> BTreeMap<PathBuf, FileInfo> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).follow_links(options.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable path: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if options.video_only && !is_video(entry.path()) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("skipping {:?}: {e}", entry.path());
                continue;
            }
        };
        if metadata.len() < options.min_size {
            continue;
        }

        let mtime_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        tracing::trace!("scanned: {:?}", entry.path());
        files.insert(
            entry.path().to_path_buf(),
            FileInfo {
                path: entry.path().to_path_buf(),
                size: metadata.len(),
                mtime_ns,
            },
        );
    }
    files
}
