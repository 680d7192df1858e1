use anyhow::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use super::{Matcher, Strictness};
use crate::domain::models::{ExternalId, MediaMetadata, Movie, TvEpisode};
use crate::infra::process::run_with_timeout;

const OUTPUT_TAIL_LINES: usize = 50;

/// FileBot's AMC script in `--action test` mode; nothing is written by FileBot.
pub struct FilebotMatcher {
    pub program: String,
    /// Arguments placed before the AMC arguments (e.g. a script path for `sh`).
    pub program_args: Vec<String>,
    pub output_root: PathBuf,
    pub defs: Vec<String>,
    pub timeout: Duration,
}

impl FilebotMatcher {
    fn command(&self, file_path: &Path, strictness: Strictness) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.program_args)
            .args(["-script", "fn:amc", "--action", "test", "--output"])
            .arg(&self.output_root)
            .args(["--conflict", "auto"]);
        if strictness == Strictness::Lenient {
            cmd.arg("-non-strict");
        }
        for def in &self.defs {
            cmd.args(["--def", def.as_str()]);
        }
        cmd.arg(file_path);
        cmd
    }
}

impl Matcher for FilebotMatcher {
    fn identify(&self, file_path: &Path, strictness: Strictness) -> Result<Option<MediaMetadata>> {
        let mut cmd = self.command(file_path, strictness);
        tracing::debug!("[filebot] {cmd:?}");

        let output = run_with_timeout(&mut cmd, self.timeout)?;
        if output.timed_out {
            eprintln!("Matcher timed out after {:?} ({strictness:?}).", self.timeout);
            return Ok(None);
        }

        let text = output.combined();
        tracing::debug!("[filebot rc] {:?}", output.code());
        tracing::debug!("{}", tail(&text, OUTPUT_TAIL_LINES));

        if !output.success() {
            if text.to_lowercase().contains("ignore extra:") {
                eprintln!("Matcher ignored this file as an extra ({strictness:?}).");
            } else {
                eprintln!("Matcher did not recognize this file ({strictness:?}).");
            }
            return Ok(None);
        }

        let destinations = parse_destinations(&text);
        if destinations.is_empty() {
            if text.to_lowercase().contains("no files selected for processing") {
                eprintln!("Matcher selected 0 files (likely considered an extra).");
            } else {
                eprintln!("Matcher succeeded but no destinations were parsed.");
            }
            return Ok(None);
        }

        eprintln!("Proposed destinations:");
        for dest in &destinations {
            eprintln!("  -> {}", dest.display());
        }
        Ok(destinations.iter().find_map(|d| metadata_from_destination(d)))
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

fn test_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[[A-Z_]+\] from \[(.+)\] to \[(.+)\]$").unwrap())
}

fn action_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:Move|Rename|Copy|Link)\b.*?\b(?:to|into)\b\s+["'\[]?([^"'\]]+)["'\]]?$"#)
            .unwrap()
    })
}

/// Destination paths announced by the matcher, first occurrence order.
pub fn parse_destinations(output: &str) -> Vec<PathBuf> {
    let mut destinations: Vec<PathBuf> = Vec::new();
    for line in output.lines().map(str::trim) {
        let dest = test_line_re()
            .captures(line)
            .or_else(|| action_line_re().captures(line))
            .and_then(|caps| caps.get(caps.len() - 1))
            .map(|m| PathBuf::from(m.as_str().trim()));

        if let Some(dest) = dest {
            if !destinations.contains(&dest) {
                destinations.push(dest);
            }
        }
    }
    destinations
}

fn id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\{(tmdb|tvdb|imdb)-(\w+)\}").unwrap())
}

fn episode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<series>.+?)(?: \((?P<year>\d{4})\))? - S(?P<season>\d{1,3})E(?P<episode>\d{1,4})(?:-?E\d{1,4})*(?: - (?P<title>.+))?$",
        )
        .unwrap()
    })
}

fn titled_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<title>.+?) \((?P<year>\d{4})\)").unwrap())
}

/// Reads metadata back out of a library-style destination path.
pub fn metadata_from_destination(dest: &Path) -> Option<MediaMetadata> {
    let external_id = id_re()
        .captures(&dest.to_string_lossy())
        .map(|caps| ExternalId::new(&caps[1], &caps[2]));

    let stem = dest.file_stem()?.to_string_lossy();
    let stem = id_re().replace_all(&stem, "");
    let stem = stem.trim();

    if let Some(caps) = episode_re().captures(stem) {
        let year = match caps.name("year") {
            Some(year) => year.as_str().parse().ok()?,
            None => year_from_ancestors(dest)?,
        };
        return Some(MediaMetadata::TvEpisode(TvEpisode {
            series_title: caps["series"].trim().to_string(),
            year,
            season: caps["season"].parse().ok()?,
            episode: caps["episode"].parse().ok()?,
            episode_title: caps.name("title").map(|t| t.as_str().trim().to_string()),
            external_id,
        }));
    }

    let caps = titled_year_re().captures(stem)?;
    Some(MediaMetadata::Movie(Movie {
        title: caps["title"].trim().to_string(),
        year: caps["year"].parse().ok()?,
        external_id,
    }))
}

fn year_from_ancestors(dest: &Path) -> Option<u16> {
    dest.ancestors().skip(1).find_map(|dir| {
        let name = dir.file_name()?.to_string_lossy();
        titled_year_re()
            .captures(&name)
            .and_then(|caps| caps["year"].parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_destinations() {
        let output = "\
Run script [fn:amc] at [Mon Jan 01 00:00:00 UTC 2024]
[TEST] from [/dl/heat.1995.mkv] to [/lib/Movies/Heat (1995) {tmdb-949}/Heat (1995).mkv]
[TEST] from [/dl/heat.1995.mkv] to [/lib/Movies/Heat (1995) {tmdb-949}/Heat (1995).mkv]
[HARDLINK] from [/dl/x.mkv] to [/lib/TV Shows/X/Season 01/X - S01E02.mkv]
Processed 1 file
";
        assert_eq!(
            parse_destinations(output),
            vec![
                PathBuf::from("/lib/Movies/Heat (1995) {tmdb-949}/Heat (1995).mkv"),
                PathBuf::from("/lib/TV Shows/X/Season 01/X - S01E02.mkv"),
            ]
        );
    }

    #[test]
    fn test_parse_destinations_generic_action_line() {
        let output = "Rename movies using [TheMovieDB]\nLink file to \"/lib/Movies/Heat (1995)/Heat (1995).mkv\"\n";
        assert_eq!(
            parse_destinations(output),
            vec![PathBuf::from("/lib/Movies/Heat (1995)/Heat (1995).mkv")]
        );
        assert!(parse_destinations("No files selected for processing").is_empty());
    }

    #[test]
    fn test_movie_from_destination() {
        let meta = metadata_from_destination(Path::new(
            "/lib/Movies/Heat (1995) {tmdb-949}/Heat (1995).mkv",
        ));
        assert_eq!(
            meta,
            Some(MediaMetadata::Movie(Movie {
                title: "Heat".to_string(),
                year: 1995,
                external_id: Some(ExternalId::new("tmdb", "949")),
            }))
        );
    }

    #[test]
    fn test_episode_from_destination() {
        let meta = metadata_from_destination(Path::new(
            "/lib/TV Shows/Sherlock Holmes (1954) {tvdb-76644}/Season 01/Sherlock Holmes (1954) - S01E03 - The Case of the Texas Cowgirl.mkv",
        ));
        assert_eq!(
            meta,
            Some(MediaMetadata::TvEpisode(TvEpisode {
                series_title: "Sherlock Holmes".to_string(),
                year: 1954,
                season: 1,
                episode: 3,
                episode_title: Some("The Case of the Texas Cowgirl".to_string()),
                external_id: Some(ExternalId::new("tvdb", "76644")),
            }))
        );
    }

    #[test]
    fn test_episode_year_from_series_folder() {
        let meta = metadata_from_destination(Path::new(
            "/lib/TV Shows/The Show (2010)/Season 02/The Show - S02E10.mkv",
        ));
        let Some(MediaMetadata::TvEpisode(episode)) = meta else {
            panic!("expected an episode, got {meta:?}");
        };
        assert_eq!(episode.series_title, "The Show");
        assert_eq!(episode.year, 2010);
        assert_eq!((episode.season, episode.episode), (2, 10));
        assert_eq!(episode.episode_title, None);
        assert_eq!(episode.external_id, None);
    }

    #[test]
    fn test_unparseable_destinations() {
        // No year anywhere for the series.
        assert_eq!(
            metadata_from_destination(Path::new("/lib/TV Shows/Show/Season 01/Show - S01E01.mkv")),
            None
        );
        assert_eq!(metadata_from_destination(Path::new("/lib/Other/random.mkv")), None);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::fs;
        use tempfile::TempDir;

        // Succeeds only when run non-strict.
        const FAKE_FILEBOT: &str = r#"
for arg; do last="$arg"; done
case " $* " in
  *" -non-strict "*)
    echo "[TEST] from [$last] to [/lib/Movies/Heat (1995) {tmdb-949}/Heat (1995).mkv]"
    exit 0 ;;
  *)
    echo "Failed to identify or process any files"
    exit 1 ;;
esac
"#;

        fn fake_matcher(temp_dir: &TempDir, script: &str, timeout: Duration) -> FilebotMatcher {
            let script_path = temp_dir.path().join("filebot.sh");
            fs::write(&script_path, script).unwrap();
            FilebotMatcher {
                program: "sh".to_string(),
                program_args: vec![script_path.to_string_lossy().into_owned()],
                output_root: temp_dir.path().to_path_buf(),
                defs: vec!["clean=n".to_string()],
                timeout,
            }
        }

        #[test]
        fn test_strict_fails_lenient_matches() {
            let temp_dir = TempDir::new().unwrap();
            let matcher = fake_matcher(&temp_dir, FAKE_FILEBOT, Duration::from_secs(10));
            let file = Path::new("/dl/heat.1995.mkv");

            assert_eq!(matcher.identify(file, Strictness::Strict).unwrap(), None);
            let meta = matcher.identify(file, Strictness::Lenient).unwrap();
            assert!(matches!(meta, Some(MediaMetadata::Movie(ref m)) if m.title == "Heat"));
            assert!(crate::workflows::matchers::identify(&matcher, file).is_some());
        }

        #[test]
        fn test_timeout_is_no_match() {
            let temp_dir = TempDir::new().unwrap();
            let matcher = fake_matcher(&temp_dir, "exec sleep 30\n", Duration::from_millis(200));
            assert_eq!(
                matcher.identify(Path::new("/dl/a.mkv"), Strictness::Strict).unwrap(),
                None
            );
        }
    }
}
