use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_MATCHER: &str = "filebot";
const DEFAULT_MATCHER_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    matcher_command: Option<String>,
    matcher_timeout_secs: Option<u64>,
    amc_defs: Option<Vec<String>>,
    id_source: Option<String>,
    movies_dir: Option<String>,
    tv_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub matcher_command: String,
    pub matcher_timeout_secs: u64,
    pub amc_defs: Vec<String>,
    /// Database name used for manually entered ids
    pub id_source: String,
    pub movies_dir: String,
    pub tv_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matcher_command: DEFAULT_MATCHER.to_string(),
            matcher_timeout_secs: DEFAULT_MATCHER_TIMEOUT_SECS,
            amc_defs: vec![
                "clean=n".to_string(),
                "artwork=n".to_string(),
                "music=n".to_string(),
            ],
            id_source: "tmdb".to_string(),
            movies_dir: "Movies".to_string(),
            tv_dir: "TV Shows".to_string(),
        }
    }
}

impl Config {
    /// Defaults, overlaid by the config file, overlaid by the environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&get_config_path())?;

        if let Ok(matcher) = env::var("FILEBROKE_MATCHER") {
            config.matcher_command = matcher;
        }
        if let Ok(timeout) = env::var("FILEBROKE_MATCHER_TIMEOUT") {
            config.matcher_timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid FILEBROKE_MATCHER_TIMEOUT: {timeout}"))?;
        }

        Ok(config)
    }

    fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = Self::default();
        if !config_path.exists() {
            return Ok(config);
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {config_path:?}"))?;
        let file: ConfigFile = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file {config_path:?}"))?;

        if let Some(matcher) = file.matcher_command {
            config.matcher_command = matcher;
        }
        if let Some(timeout) = file.matcher_timeout_secs {
            config.matcher_timeout_secs = timeout;
        }
        if let Some(defs) = file.amc_defs {
            config.amc_defs = defs;
        }
        if let Some(source) = file.id_source {
            config.id_source = source;
        }
        if let Some(dir) = file.movies_dir {
            config.movies_dir = dir;
        }
        if let Some(dir) = file.tv_dir {
            config.tv_dir = dir;
        }
        Ok(config)
    }
}

pub fn get_cache_path() -> PathBuf {
    get_config_dir_path().join("hash-cache.json")
}

fn get_config_dir_path() -> PathBuf {
    xdir::config()
        .map(|path| path.join("filebroke"))
        // If the standard path could not be found (e.g.`$HOME` is not set),
        // default to the current directory.
        .unwrap_or_default()
}

fn get_config_path() -> PathBuf {
    get_config_dir_path().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.matcher_command, "filebot");
        assert_eq!(config.tv_dir, "TV Shows");
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "matcher_command = \"/opt/filebot/filebot.sh\"\nmatcher_timeout_secs = 30\nmovies_dir = \"Films\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.matcher_command, "/opt/filebot/filebot.sh");
        assert_eq!(config.matcher_timeout_secs, 30);
        assert_eq!(config.movies_dir, "Films");
        assert_eq!(config.tv_dir, "TV Shows");
        assert_eq!(config.amc_defs.len(), 3);
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "matcher_timeout_secs = \"soon\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
