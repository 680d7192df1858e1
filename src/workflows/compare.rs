use anyhow::{bail, Result};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::cli::{CompareArgs, HashMethod, MatchMode, OutputFormat};
use crate::config;
use crate::domain::models::MissingFileRecord;
use crate::infra::cache::{HashCache, HashEntry};
use crate::media::hash::hash_file;
use crate::media::scan::{collect_files, is_video, FileInfo, ScanOptions};
use crate::media::subtitles::find_subtitles_for;

pub struct CompareOptions {
    pub scan: ScanOptions,
    pub match_mode: MatchMode,
    pub hash_method: HashMethod,
    pub chunk_size: u64,
    /// Hash cache location; `None` disables caching.
    pub cache_path: Option<PathBuf>,
}

impl CompareOptions {
    pub fn from_args(args: &CompareArgs) -> Self {
        let cache_path = match args.cache.as_deref() {
            Some(c) if c.eq_ignore_ascii_case("none") => None,
            Some(c) => Some(PathBuf::from(c)),
            None => Some(config::get_cache_path()),
        };
        Self {
            scan: ScanOptions {
                min_size: args.min_size,
                video_only: args.video_only,
                follow_symlinks: args.follow_symlinks,
            },
            match_mode: args.match_mode,
            hash_method: args.hash_method,
            chunk_size: args.chunk_size,
            cache_path,
        }
    }
}

pub fn run(args: &CompareArgs) -> Result<()> {
    let options = CompareOptions::from_args(args);
    let missing = find_missing(&args.src, &args.dst, &options)?;

    let stdout = std::io::stdout();
    write_records(&missing, args.format, &mut stdout.lock())
}

/// One record per source file that has no counterpart under `dst_root`.
pub fn find_missing(
    src_root: &Path,
    dst_root: &Path,
    options: &CompareOptions,
) -> Result<Vec<MissingFileRecord>> {
    for root in [src_root, dst_root] {
        if !root.is_dir() {
            bail!("Source or destination path does not exist or is not a directory: {root:?}");
        }
    }

    let src_files = collect_files(src_root, &options.scan);
    let dst_files = collect_files(dst_root, &options.scan);
    tracing::debug!(
        "scanned {} source and {} destination files",
        src_files.len(),
        dst_files.len()
    );

    let missing: Vec<&FileInfo> = match options.match_mode {
        MatchMode::Name => missing_by_name(&src_files, &dst_files),
        MatchMode::Hash => missing_by_hash(&src_files, &dst_files, options)?,
    };

    Ok(missing
        .into_iter()
        .map(|info| {
            let mut record = MissingFileRecord::new(&info.path, src_root, info.size);
            if is_video(&info.path) {
                record.subtitles = find_subtitles_for(&info.path);
            }
            record
        })
        .collect())
}

/// Lowercased file name with separator runs collapsed to single spaces.
pub fn normalize_name(name: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS
        .get_or_init(|| Regex::new(r"[._\s-]+").unwrap())
        .replace_all(&name.to_lowercase(), " ")
        .trim()
        .to_string()
}

fn normalized_file_name(p: &Path) -> Option<String> {
    p.file_name().map(|n| normalize_name(&n.to_string_lossy()))
}

fn missing_by_name<'a>(
    src_files: &'a BTreeMap<PathBuf, FileInfo>,
    dst_files: &BTreeMap<PathBuf, FileInfo>,
) -> Vec<&'a FileInfo> {
    let dst_names: HashSet<String> = dst_files
        .keys()
        .filter_map(|p| normalized_file_name(p))
        .collect();

    src_files
        .values()
        .filter(|info| {
            normalized_file_name(&info.path)
                .map(|name| !dst_names.contains(&name))
                .unwrap_or(true)
        })
        .collect()
}

fn missing_by_hash<'a>(
    src_files: &'a BTreeMap<PathBuf, FileInfo>,
    dst_files: &BTreeMap<PathBuf, FileInfo>,
    options: &CompareOptions,
) -> Result<Vec<&'a FileInfo>> {
    let mut cache = options.cache_path.as_deref().map(HashCache::load);

    let mut digest = |info: &FileInfo| -> Option<String> {
        let method = options.hash_method.as_str();
        if let Some(hash) = cache
            .as_ref()
            .and_then(|c| c.get(&info.path, info.mtime_ns, info.size, method, options.chunk_size))
        {
            return Some(hash.to_string());
        }

        match hash_file(&info.path, options.hash_method, options.chunk_size) {
            Ok(hash) => {
                if let Some(cache) = cache.as_mut() {
                    cache.set(
                        &info.path,
                        HashEntry {
                            mtime_ns: info.mtime_ns,
                            size: info.size,
                            method: method.to_string(),
                            chunk_size: options.chunk_size,
                            hash: hash.clone(),
                        },
                    );
                }
                Some(hash)
            }
            Err(e) => {
                eprintln!("[hash error] {:?}: {e:#}", info.path);
                None
            }
        }
    };

    let dst_hashes: HashSet<String> = dst_files.values().filter_map(&mut digest).collect();

    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    for info in src_files.values() {
        let Some(hash) = digest(info) else {
            continue;
        };
        // Identical source copies are reported once.
        if !dst_hashes.contains(&hash) && seen.insert(hash) {
            missing.push(info);
        }
    }

    if let Some(cache) = cache {
        if let Err(e) = cache.save() {
            tracing::warn!("failed to save hash cache: {e}");
        }
    }

    Ok(missing)
}

pub fn write_records(
    records: &[MissingFileRecord],
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Jsonl => {
            for record in records {
                // Paths that are not valid UTF-8 have no JSON form.
                let line = match serde_json::to_string(record) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("skipping {:?}: {e}", record.source_path);
                        continue;
                    }
                };
                writeln!(out, "{line}")?;
                out.flush()?;
            }
        }
        OutputFormat::Text => {
            if records.is_empty() {
                writeln!(out, "All matched.")?;
            }
            for record in records {
                writeln!(out, "- {}", record.source_path.display())?;
                if !record.subtitles.is_empty() {
                    let subs: Vec<String> = record
                        .subtitles
                        .iter()
                        .map(|s| s.display().to_string())
                        .collect();
                    writeln!(out, "    subtitles: {}", subs.join(", "))?;
                }
            }
        }
    }
    Ok(())
}
