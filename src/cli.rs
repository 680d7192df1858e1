use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Jsonl,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum MatchMode {
    /// Compare normalized file names
    Name,
    /// Compare file contents by digest
    Hash,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum HashMethod {
    Full,
    Partial,
}

#[derive(Parser)]
#[command(name = "filebroke")]
#[command(about = "Find downloads missing from a media library and hardlink them into place")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print matcher commands, matcher output and other diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Emit a record for every source file missing from the destination tree
    Compare(CompareArgs),
    /// Identify and hardlink records produced by `compare`
    Link(LinkArgs),
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Source root (e.g. a downloads directory)
    #[arg(long)]
    pub src: PathBuf,

    /// Destination root (e.g. the media library)
    #[arg(long)]
    pub dst: PathBuf,

    /// Output format; jsonl is pipeline-friendly
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// How to decide that a source file is already in the destination
    #[arg(long, value_enum, default_value = "name")]
    pub match_mode: MatchMode,

    /// Ignore files smaller than this (e.g. 100M, 1.5G)
    #[arg(long, default_value = "0", value_parser = parse_size)]
    pub min_size: u64,

    /// Only consider video files
    #[arg(long)]
    pub video_only: bool,

    #[arg(long)]
    pub follow_symlinks: bool,

    /// Hash method used by the hash match mode
    #[arg(long, value_enum, default_value = "partial")]
    pub hash_method: HashMethod,

    /// Bytes read from each end of a file for partial hashing
    #[arg(long, default_value_t = 4 * 1024 * 1024, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,

    /// Hash cache path, or 'none' to disable caching
    #[arg(long)]
    pub cache: Option<String>,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Library root that holds the movie and TV directories
    #[arg(long)]
    pub library_root: PathBuf,

    /// Ask before processing and before linking each file
    #[arg(long)]
    pub interactive: bool,

    /// Copy instead of failing when a hardlink is blocked (cross-device, permissions)
    #[arg(long)]
    pub fallback_copy: bool,

    /// External matcher executable
    #[arg(long)]
    pub matcher: Option<String>,

    /// Seconds to wait for each matcher run
    #[arg(long)]
    pub matcher_timeout: Option<u64>,

    /// Extra --def KEY=VAL passed to the matcher (repeatable)
    #[arg(long = "amc-def")]
    pub amc_defs: Vec<String>,

    /// Skip automatic identification and go straight to manual entry
    #[arg(long)]
    pub no_matcher: bool,

    /// JSONL file with records; standard input is read otherwise
    pub jsonl_file: Option<PathBuf>,
}

pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();
    let (number, multiplier) = match s.chars().last() {
        Some('k') => (&s[..s.len() - 1], 1024u64),
        Some('m') => (&s[..s.len() - 1], 1024u64.pow(2)),
        Some('g') => (&s[..s.len() - 1], 1024u64.pow(3)),
        Some('t') => (&s[..s.len() - 1], 1024u64.pow(4)),
        Some(c) if c.is_ascii_digit() => (s.as_str(), 1),
        _ => return Err(format!("Invalid size: {s}")),
    };

    if multiplier == 1 {
        return number.parse().map_err(|_| format!("Invalid size: {s}"));
    }

    let value: f64 = number.parse().map_err(|_| format!("Invalid size: {s}"))?;
    if value < 0.0 {
        return Err(format!("Invalid size: {s}"));
    }
    Ok((value * multiplier as f64) as u64)
}
