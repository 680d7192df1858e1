use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::layout::Library;
use super::manual::manual_entry;
use super::matchers::{self, filebot::FilebotMatcher, ManualOnly, Matcher};
use super::prompt::{confirm, menu_choice, operator_prompter, MenuChoice, Prompter};
use crate::cli::LinkArgs;
use crate::config::Config;
use crate::domain::models::{
    LinkAction, LinkReport, MediaMetadata, MissingFileRecord, SubtitleAction, SubtitleReport,
};
use crate::infra::hardlink::{self, LinkMethod};
use crate::media::scan::has_extension;
use crate::media::subtitles::{subtitle_destination_name, SUBTITLE_EXTENSIONS};

type LinkFn = fn(&Path, &Path, bool) -> io::Result<LinkMethod>;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkOptions {
    pub interactive: bool,
    pub fallback_copy: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub processed: usize,
    pub linked: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl LinkStats {
    fn record(&mut self, report: &LinkReport) {
        self.processed += 1;
        match report.action {
            LinkAction::Linked | LinkAction::Copied => self.linked += 1,
            LinkAction::Failed => self.failed += 1,
            _ => self.skipped += 1,
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

pub fn run(args: &LinkArgs, config: &Config) -> Result<()> {
    let library = Library::new(&args.library_root, config)?;

    let records = match &args.jsonl_file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {path:?}"))?;
            read_records(BufReader::new(file))?
        }
        None => read_records(io::stdin().lock())?,
    };
    if records.is_empty() {
        tracing::info!("no input records");
        return Ok(());
    }

    let matcher: Box<dyn Matcher> = if args.no_matcher {
        Box::new(ManualOnly)
    } else {
        let mut defs = config.amc_defs.clone();
        defs.extend(args.amc_defs.iter().cloned());
        Box::new(FilebotMatcher {
            program: args
                .matcher
                .clone()
                .unwrap_or_else(|| config.matcher_command.clone()),
            program_args: Vec::new(),
            output_root: library.root.clone(),
            defs,
            timeout: Duration::from_secs(
                args.matcher_timeout.unwrap_or(config.matcher_timeout_secs),
            ),
        })
    };
    let mut prompter = operator_prompter(args.jsonl_file.is_none())?;

    let options = LinkOptions {
        interactive: args.interactive,
        fallback_copy: args.fallback_copy,
    };
    let mut linker = Linker::new(&library, matcher.as_ref(), prompter.as_mut(), options, &config.id_source);

    let stdout = io::stdout();
    let stats = linker.run(&records, &mut stdout.lock())?;
    eprintln!(
        "\nDone: {} processed, {} linked, {} skipped, {} failed",
        stats.processed, stats.linked, stats.skipped, stats.failed
    );
    Ok(())
}

/// Parses JSON Lines, skipping blank and malformed lines. A read error is fatal.
pub fn read_records(reader: impl BufRead) -> Result<Vec<MissingFileRecord>> {
    let mut records = Vec::new();
    for line in reader.split(b'\n') {
        let line = line.context("Failed to read input records")?;
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(record) => records.push(record),
            Err(e) => eprintln!(
                "Skipping invalid JSON line ({e}): {}",
                String::from_utf8_lossy(line)
            ),
        }
    }
    Ok(records)
}

pub struct Linker<'a> {
    library: &'a Library,
    matcher: &'a dyn Matcher,
    prompter: &'a mut dyn Prompter,
    options: LinkOptions,
    id_source: String,
    link_file: LinkFn,
    process_all: bool,
    ignore_all: bool,
}

impl<'a> Linker<'a> {
    pub fn new(
        library: &'a Library,
        matcher: &'a dyn Matcher,
        prompter: &'a mut dyn Prompter,
        options: LinkOptions,
        id_source: &str,
    ) -> Self {
        Self {
            library,
            matcher,
            prompter,
            options,
            id_source: id_source.to_string(),
            link_file: hardlink::link_atomic,
            process_all: false,
            ignore_all: false,
        }
    }

    /// Processes records in order, writing one JSON report per record to `out`.
    /// Stops early when the operator quits.
    pub fn run(&mut self, records: &[MissingFileRecord], out: &mut impl Write) -> Result<LinkStats> {
        let mut stats = LinkStats::default();
        let total = records.len();
        for (idx, record) in records.iter().enumerate() {
            eprintln!("\n{}\n[{}/{}] SRC: {}", "=".repeat(80), idx + 1, total, record.source_path.display());

            let (report, flow) = self.process(record)?;
            eprintln!("  -> {}", describe(&report));
            serde_json::to_writer(&mut *out, &report)?;
            writeln!(out)?;
            out.flush()?;
            stats.record(&report);

            if let Flow::Quit = flow {
                break;
            }
        }
        Ok(stats)
    }

    fn asks(&self) -> bool {
        self.options.interactive && !self.process_all
    }

    fn process(&mut self, record: &MissingFileRecord) -> Result<(LinkReport, Flow)> {
        let src = record.source_path.as_path();
        if !src.is_file() {
            return Ok((LinkReport::new(src, LinkAction::MissingSrc), Flow::Continue));
        }

        if self.options.interactive {
            if self.ignore_all {
                return Ok((LinkReport::new(src, LinkAction::IgnoredAll), Flow::Continue));
            }
            if !self.process_all {
                match menu_choice(self.prompter, record)? {
                    MenuChoice::Process => {}
                    MenuChoice::ProcessAll => self.process_all = true,
                    MenuChoice::Skip => {
                        return Ok((LinkReport::new(src, LinkAction::SkippedByUser), Flow::Continue));
                    }
                    MenuChoice::IgnoreAll => {
                        self.ignore_all = true;
                        return Ok((LinkReport::new(src, LinkAction::IgnoredAll), Flow::Continue));
                    }
                    MenuChoice::Quit => {
                        return Ok((LinkReport::new(src, LinkAction::AbortedByUser), Flow::Quit));
                    }
                }
            }
        }

        let Some(meta) = self.identify(src)? else {
            return Ok((LinkReport::new(src, LinkAction::ManualAborted), Flow::Continue));
        };

        let dst = self.library.destination_for(&meta, src);
        eprintln!("Destination: {}", dst.display());
        if self.asks() && !confirm(self.prompter, &format!("Link -> {}? [y/N] ", dst.display()))? {
            return Ok((LinkReport::new(src, LinkAction::SkippedByUser), Flow::Continue));
        }

        if dst.symlink_metadata().is_ok() {
            return Ok((LinkReport::new(src, LinkAction::Exists).with_dst(&dst), Flow::Continue));
        }

        let report = match (self.link_file)(src, &dst, self.options.fallback_copy) {
            Ok(method) => {
                let action = match method {
                    LinkMethod::Hardlink => LinkAction::Linked,
                    LinkMethod::Copy => LinkAction::Copied,
                };
                let mut report = LinkReport::new(src, action).with_dst(&dst);
                report.subs = self.link_subtitles(&record.subtitles, &dst);
                report
            }
            Err(e) => report_link_error(src, &dst, &e),
        };
        Ok((report, Flow::Continue))
    }

    /// Automatic identification first, manual entry as the fallback.
    fn identify(&mut self, src: &Path) -> Result<Option<MediaMetadata>> {
        if let Some(meta) = matchers::identify(self.matcher, src) {
            eprintln!("Identified: {meta}");
            if !self.asks() || confirm(self.prompter, "Use this identification? [y/N] ")? {
                return Ok(Some(meta));
            }
        }

        eprintln!("Matcher couldn't (or declined). Manual mode.");
        manual_entry(self.prompter, &self.id_source)
    }

    fn link_subtitles(&self, subtitles: &[PathBuf], video_dst: &Path) -> Vec<SubtitleReport> {
        let video_stem = video_dst
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut reports = Vec::new();
        for sub in subtitles {
            if !has_extension(sub, SUBTITLE_EXTENSIONS) {
                continue;
            }
            let dst = video_dst.with_file_name(subtitle_destination_name(&video_stem, sub));
            let (action, error) = if dst.symlink_metadata().is_ok() {
                (SubtitleAction::SkippedExists, None)
            } else {
                match (self.link_file)(sub, &dst, self.options.fallback_copy) {
                    Ok(LinkMethod::Hardlink) => (SubtitleAction::Linked, None),
                    Ok(LinkMethod::Copy) => (SubtitleAction::Copied, None),
                    Err(e) => (SubtitleAction::Failed, Some(e.to_string())),
                }
            };
            tracing::debug!("[subs] {sub:?} -> {dst:?}: {action:?}");
            reports.push(SubtitleReport {
                src: sub.clone(),
                dst: (action != SubtitleAction::Failed).then_some(dst),
                action,
                error,
            });
        }
        reports
    }

    #[cfg(test)]
    fn with_link_fn(mut self, link_file: LinkFn) -> Self {
        self.link_file = link_file;
        self
    }
}

/// Cross-device links are skips; anything else is a failure.
fn report_link_error(src: &Path, dst: &Path, e: &io::Error) -> LinkReport {
    let action = if hardlink::is_cross_device(e) {
        LinkAction::CrossDevice
    } else {
        LinkAction::Failed
    };
    LinkReport::new(src, action).with_dst(dst).with_error(e.to_string())
}

fn describe(report: &LinkReport) -> String {
    let dst = report
        .dst_path
        .as_ref()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    match report.action {
        LinkAction::MissingSrc => "missing source; skipped".to_string(),
        LinkAction::IgnoredAll => "ignored-all".to_string(),
        LinkAction::SkippedByUser => "skipped-by-user".to_string(),
        LinkAction::AbortedByUser => "aborted-by-user".to_string(),
        LinkAction::ManualAborted => "manual aborted".to_string(),
        LinkAction::Exists => format!("already exists; skipped ({dst})"),
        LinkAction::CrossDevice => format!("cannot hardlink across filesystems; skipped ({dst})"),
        LinkAction::Linked => format!("linked to {dst}"),
        LinkAction::Copied => format!("copied to {dst}"),
        LinkAction::Failed => format!(
            "FAILED: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
