use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::scan::has_extension;

pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "sub", "ass", "vtt", "idx"];

const SUBTITLE_FLAGS: &[&str] = &["forced", "sdh", "cc", "hi"];

fn stem_lower(p: &Path) -> String {
    p.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Subtitle files next to `video` (or in a sibling `Subs/` directory) that look
/// like they belong to it.
pub fn find_subtitles_for(video: &Path) -> Vec<PathBuf> {
    let Some(parent) = video.parent() else {
        return Vec::new();
    };
    let video_stem = stem_lower(video);

    let mut dirs = vec![parent.to_path_buf()];
    let subs_dir = parent.join("Subs");
    if subs_dir.is_dir() {
        dirs.push(subs_dir);
    }

    let mut found = Vec::new();
    for dir in dirs {
        let candidates = match subtitle_files(&dir) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("cannot list {dir:?}: {e}");
                continue;
            }
        };

        let mut matched: Vec<PathBuf> = candidates
            .iter()
            .filter(|p| stem_lower(p).contains(&video_stem))
            .cloned()
            .collect();

        if matched.is_empty() {
            let words: HashSet<&str> = video_stem.split_whitespace().collect();
            matched = candidates
                .into_iter()
                .filter(|p| {
                    let stem = stem_lower(p);
                    stem.split_whitespace().any(|w| words.contains(w))
                })
                .collect();
        }
        found.extend(matched);
    }
    found
}

fn subtitle_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, SUBTITLE_EXTENSIONS) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn language_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{2,3}(?:-[a-z]{2})?$").unwrap())
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[._\s-]+").unwrap())
}

/// Name for a subtitle linked beside a video called `video_stem`.
///
/// A subtitle already named after the video keeps whatever follows that name.
/// Otherwise the trailing run of language and flag tokens is kept:
/// `Movie.en.forced.srt` -> `<stem>.en.forced.srt`.
pub fn subtitle_destination_name(video_stem: &str, subtitle: &Path) -> String {
    let sub_name = subtitle
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dotted_stem = video_stem.replace(' ', ".").to_ascii_lowercase();
    if let Some(idx) = sub_name.to_ascii_lowercase().find(&dotted_stem) {
        let tail = &sub_name[idx + dotted_stem.len()..];
        if tail.is_empty() || tail.starts_with(['.', ' ', '-']) {
            return format!("{video_stem}{tail}");
        }
    }

    let sub_stem = subtitle
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = subtitle
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut suffix = Vec::new();
    for part in separators().split(&sub_stem).collect::<Vec<_>>().into_iter().rev() {
        let part = part.trim().to_lowercase();
        if part.is_empty() {
            continue;
        }
        if language_token().is_match(&part) || SUBTITLE_FLAGS.contains(&part.as_str()) {
            suffix.insert(0, part);
        } else {
            break;
        }
    }

    if suffix.is_empty() {
        format!("{video_stem}{ext}")
    } else {
        format!("{video_stem}.{}{ext}", suffix.join("."))
    }
}
