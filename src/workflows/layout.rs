use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::domain::models::{MediaMetadata, Movie, TvEpisode};

/// Library root plus the names of its movie and TV directories.
#[derive(Debug, Clone)]
pub struct Library {
    pub root: PathBuf,
    pub movies_dir: String,
    pub tv_dir: String,
}

impl Library {
    pub fn new(root: &Path, config: &Config) -> Result<Self> {
        if !root.is_dir() {
            bail!("Library root must exist and be a directory: {root:?}");
        }
        Ok(Self {
            root: root.to_path_buf(),
            movies_dir: config.movies_dir.clone(),
            tv_dir: config.tv_dir.clone(),
        })
    }

    /// Absolute destination for `meta`, keeping the source file's extension.
    pub fn destination_for(&self, meta: &MediaMetadata, source: &Path) -> PathBuf {
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.root.join(relative_destination(meta, &self.movies_dir, &self.tv_dir, &ext))
    }
}

pub fn relative_destination(
    meta: &MediaMetadata,
    movies_dir: &str,
    tv_dir: &str,
    ext: &str,
) -> PathBuf {
    match meta {
        MediaMetadata::Movie(movie) => Path::new(movies_dir)
            .join(movie_folder(movie))
            .join(format!("{}{ext}", movie_name(movie))),
        MediaMetadata::TvEpisode(episode) => Path::new(tv_dir)
            .join(series_folder(episode))
            .join(format!("Season {:02}", episode.season))
            .join(format!("{}{ext}", episode_name(episode))),
    }
}

fn movie_name(movie: &Movie) -> String {
    format!("{} ({})", sanitize_filename(&movie.title), movie.year)
}

fn movie_folder(movie: &Movie) -> String {
    match &movie.external_id {
        Some(id) => format!("{} - {{{}}}", movie_name(movie), sanitize_filename(&id.to_string())),
        None => movie_name(movie),
    }
}

fn series_folder(episode: &TvEpisode) -> String {
    let base = format!("{} ({})", sanitize_filename(&episode.series_title), episode.year);
    match &episode.external_id {
        Some(id) => format!("{base} - {{{}}}", sanitize_filename(&id.to_string())),
        None => base,
    }
}

fn episode_name(episode: &TvEpisode) -> String {
    let base = format!(
        "{} - S{:02}E{:02}",
        sanitize_filename(&episode.series_title),
        episode.season,
        episode.episode
    );
    match episode.episode_title.as_deref().map(sanitize_filename) {
        Some(title) if !title.is_empty() => format!("{base} - {title}"),
        _ => base,
    }
}

fn sanitize_filename(name: &str) -> String {
    // Remove or replace invalid filename characters
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
