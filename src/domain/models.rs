use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A source file with no counterpart in the destination tree.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MissingFileRecord {
    #[serde(rename = "src")]
    pub source_path: PathBuf,
    #[serde(rename = "basename", default)]
    pub inferred_basename: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rel_dir: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub subtitles: Vec<PathBuf>,
}

impl MissingFileRecord {
    pub fn new(source_path: &Path, source_root: &Path, size: u64) -> Self {
        let file_name = |p: Option<&std::ffi::OsStr>| {
            p.map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let rel_dir = source_path
            .parent()
            .and_then(|parent| parent.strip_prefix(source_root).ok())
            .map(|rel| rel.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = source_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Self {
            source_path: source_path.to_path_buf(),
            inferred_basename: file_name(source_path.file_name()),
            name: file_name(source_path.file_stem()),
            rel_dir,
            size,
            ext,
            subtitles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalId {
    pub source: String,
    pub value: String,
}

impl ExternalId {
    pub fn new(source: &str, value: &str) -> Self {
        Self {
            source: source.to_lowercase(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub title: String,
    pub year: u16,
    pub external_id: Option<ExternalId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvEpisode {
    pub series_title: String,
    pub year: u16,
    pub season: u32,
    pub episode: u32,
    pub episode_title: Option<String>,
    pub external_id: Option<ExternalId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaMetadata {
    Movie(Movie),
    TvEpisode(TvEpisode),
}

impl fmt::Display for MediaMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaMetadata::Movie(m) => write!(f, "Movie: {} ({})", m.title, m.year)?,
            MediaMetadata::TvEpisode(ep) => {
                write!(
                    f,
                    "TV: {} ({}) S{:02}E{:02}",
                    ep.series_title, ep.year, ep.season, ep.episode
                )?;
                if let Some(title) = &ep.episode_title {
                    write!(f, " - {title}")?;
                }
            }
        }
        match self.external_id() {
            Some(id) => write!(f, " {{{id}}}"),
            None => Ok(()),
        }
    }
}

impl MediaMetadata {
    pub fn external_id(&self) -> Option<&ExternalId> {
        match self {
            MediaMetadata::Movie(m) => m.external_id.as_ref(),
            MediaMetadata::TvEpisode(ep) => ep.external_id.as_ref(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LinkAction {
    MissingSrc,
    IgnoredAll,
    SkippedByUser,
    AbortedByUser,
    ManualAborted,
    Exists,
    CrossDevice,
    Linked,
    Copied,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SubtitleAction {
    Linked,
    Copied,
    SkippedExists,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SubtitleReport {
    pub src: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<PathBuf>,
    pub action: SubtitleAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-record outcome written to stdout by the linker.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub src: PathBuf,
    pub ok: bool,
    pub action: LinkAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subs: Vec<SubtitleReport>,
}

impl LinkReport {
    pub fn new(src: &Path, action: LinkAction) -> Self {
        let ok = matches!(
            action,
            LinkAction::Linked | LinkAction::Copied | LinkAction::Exists
        );
        Self {
            src: src.to_path_buf(),
            ok,
            action,
            dst_path: None,
            error: None,
            subs: Vec::new(),
        }
    }

    pub fn with_dst(mut self, dst: &Path) -> Self {
        self.dst_path = Some(dst.to_path_buf());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_source_path() {
        let record = MissingFileRecord::new(
            Path::new("/downloads/Some.Show/Some.Show.S01E01.mkv"),
            Path::new("/downloads"),
            42,
        );
        assert_eq!(record.inferred_basename, "Some.Show.S01E01.mkv");
        assert_eq!(record.name, "Some.Show.S01E01");
        assert_eq!(record.rel_dir, "Some.Show");
        assert_eq!(record.ext, ".mkv");
        assert_eq!(record.size, 42);
    }

    #[test]
    fn test_record_wire_format() {
        let record = MissingFileRecord::new(
            Path::new("/downloads/Amélie.mp4"),
            Path::new("/downloads"),
            1,
        );
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"src\":\"/downloads/Amélie.mp4\""));
        assert!(line.contains("\"basename\":\"Amélie.mp4\""));

        // Only the source path is required on input.
        let minimal: MissingFileRecord = serde_json::from_str(r#"{"src": "/x/y.mkv"}"#).unwrap();
        assert_eq!(minimal.source_path, PathBuf::from("/x/y.mkv"));
        assert!(minimal.subtitles.is_empty());
    }

    #[test]
    fn test_link_report_serialization() {
        let report = LinkReport::new(Path::new("/a.mkv"), LinkAction::CrossDevice)
            .with_dst(Path::new("/lib/a.mkv"))
            .with_error("Invalid cross-device link");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["action"], "cross-device");
        assert_eq!(value["ok"], false);
        assert_eq!(value["dst_path"], "/lib/a.mkv");
        assert!(value.get("subs").is_none());

        let ignored = serde_json::to_value(LinkReport::new(Path::new("/b"), LinkAction::IgnoredAll)).unwrap();
        assert_eq!(ignored["action"], "ignored-all");
        assert!(ignored.get("dst_path").is_none());
    }

    #[test]
    fn test_metadata_display() {
        let movie = MediaMetadata::Movie(Movie {
            title: "Heat".to_string(),
            year: 1995,
            external_id: Some(ExternalId::new("TMDB", "949")),
        });
        assert_eq!(movie.to_string(), "Movie: Heat (1995) {tmdb-949}");

        let episode = MediaMetadata::TvEpisode(TvEpisode {
            series_title: "Show".to_string(),
            year: 2001,
            season: 2,
            episode: 3,
            episode_title: None,
            external_id: None,
        });
        assert_eq!(episode.to_string(), "TV: Show (2001) S02E03");
    }
}
