//! # CLI Module
//!
//! Command-line interface for the media sweeper.
//!
//! ## Usage
//! ```bash
//! # Show what dedup would do
//! media-sweep dedup run ~/Photos --strategy content
//!
//! # Actually do it
//! media-sweep dedup run ~/Photos --strategy content --apply
//!
//! # Quarantine instead of deleting
//! media-sweep dedup run ~/Photos --move-to ~/Quarantine --apply
//!
//! # Junk cleanup
//! media-sweep cleanup remove-files ~/Photos -p '\.DS_Store$' -p 'Thumbs\.db$' --apply
//!
//! # JSON output for scripting
//! media-sweep cleanup sort ~/Inbox --dst ~/Library --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use media_sweeper::core::config::{suggested_workers, EngineConfig};
use media_sweeper::core::fingerprint::{FingerprintEngine, Strategy};
use media_sweeper::core::grouper;
use media_sweeper::core::naming::{GridResolver, SortStrategy};
use media_sweeper::core::plan::builder::{self, MirrorMode};
use media_sweeper::core::plan::executor::{ApplySummary, PlanExecutor};
use media_sweeper::core::plan::Plan;
use media_sweeper::core::walker::{Selection, TreeWalker, WalkConfig, WalkResult};
use media_sweeper::error::ScanError;
use media_sweeper::events::{
    ApplyEvent, Event, EventChannel, EventReceiver, FingerprintEvent, ScanEvent,
};
use media_sweeper::{Result, SweepError};

/// Media Sweeper - plan first, mutate only on apply
#[derive(Parser, Debug)]
#[command(name = "media-sweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Worker pool size (default: 4x CPUs, clamped to 4..=64)
    #[arg(long, global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Duplicate detection and removal
    Dedup {
        #[command(subcommand)]
        command: DedupCommands,
    },
    /// Tree cleanup: junk files, stray folders, naming, sorting
    Cleanup {
        #[command(subcommand)]
        command: CleanupCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DedupCommands {
    /// Find duplicate groups and plan their removal
    Run {
        /// Root directory to scan
        root: PathBuf,

        /// How file identity is decided
        #[arg(short, long, default_value = "content")]
        strategy: StrategyArg,

        /// Move duplicates here (preserving relative paths) instead of
        /// deleting them
        #[arg(long)]
        move_to: Option<PathBuf>,

        /// Skip the byte-for-byte check before planning a delete
        #[arg(long)]
        no_verify: bool,

        /// Include hidden files and directories
        #[arg(long)]
        include_hidden: bool,

        /// Follow symbolic links
        #[arg(long)]
        follow_symlinks: bool,

        /// Scan this extension in addition to the built-in media set
        /// (repeatable)
        #[arg(long = "ext", value_name = "EXT")]
        extra_extensions: Vec<String>,

        /// Execute the plan instead of only printing it
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CleanupCommands {
    /// Delete files whose name matches a pattern, pruning emptied dirs
    RemoveFiles {
        /// Root directory to scan
        root: PathBuf,

        /// Case-insensitive regex matched against file names (repeatable)
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,

        /// Keep directories the deletions leave empty
        #[arg(long)]
        no_prune_empty: bool,

        /// Execute the plan instead of only printing it
        #[arg(long)]
        apply: bool,
    },

    /// Recursively delete directories matching a name
    RemoveFolders {
        /// Root directory to scan
        root: PathBuf,

        /// Folder name to match, case-insensitive (repeatable)
        #[arg(short, long = "name", required = true)]
        names: Vec<String>,

        /// Execute the plan instead of only printing it
        #[arg(long)]
        apply: bool,
    },

    /// Report files carrying a duplicate-marker suffix in their name
    FindMarkedDupes {
        /// Root directory to scan
        root: PathBuf,

        /// Regex matched against file name stems
        #[arg(long, default_value = r"_dupe\(\d+\)$")]
        suffix: String,
    },

    /// Rename media into per-directory IMG_/VID_ sequences
    Rename {
        /// Root directory to scan
        root: PathBuf,

        /// Only rename files directly under the root
        #[arg(long)]
        no_recurse: bool,

        /// Width of the zero-padded sequence number
        #[arg(long, default_value = "6")]
        zero_pad: usize,

        /// Execute the plan instead of only printing it
        #[arg(long)]
        apply: bool,
    },

    /// Mirror media into date or location buckets
    Sort {
        /// Source directory to scan
        src: PathBuf,

        /// Destination root for the mirrored tree
        #[arg(long = "dst-root")]
        dst_root: PathBuf,

        /// Bucketing strategy
        #[arg(short, long, default_value = "by-date")]
        strategy: SortArg,

        /// Move files instead of copying them
        #[arg(long = "move")]
        relocate: bool,

        /// Execute the plan instead of only printing it
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Byte-content hash - exact duplicates only
    Content,
    /// Size + capture time + camera model - fast, needs EXIF
    Metadata,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Content => Strategy::Content,
            StrategyArg::Metadata => Strategy::Metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    /// YYYY/MM buckets from capture time (mtime fallback)
    ByDate,
    /// Coarse GPS grid buckets, "Unknown" without coordinates
    ByLocation,
}

impl From<SortArg> for SortStrategy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::ByDate => SortStrategy::ByDate,
            SortArg::ByLocation => SortStrategy::ByLocation,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> ExitCode {
    media_sweeper::init_tracing();
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            let term = Term::stderr();
            term.write_line(&format!("{} {}", style("error:").red().bold(), e))
                .ok();
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<bool> {
    let workers = cli.workers.unwrap_or_else(suggested_workers);
    let output = cli.output;

    match cli.command {
        Commands::Dedup {
            command:
                DedupCommands::Run {
                    root,
                    strategy,
                    move_to,
                    no_verify,
                    include_hidden,
                    follow_symlinks,
                    extra_extensions,
                    apply,
                },
        } => run_dedup(
            root,
            strategy.into(),
            move_to,
            EngineConfig {
                workers,
                verify_bytes: !no_verify,
            },
            WalkConfig {
                include_hidden,
                follow_symlinks,
                extra_extensions,
                ..WalkConfig::default()
            },
            apply,
            output,
        ),
        Commands::Cleanup { command } => match command {
            CleanupCommands::RemoveFiles {
                root,
                patterns,
                no_prune_empty,
                apply,
            } => {
                let walk = snapshot(&root, junk_walk_config())?;
                let plan = builder::remove_files_plan(&root, &walk, &patterns, !no_prune_empty)?;
                deliver(&plan, apply, output)
            }
            CleanupCommands::RemoveFolders { root, names, apply } => {
                let walk = snapshot(&root, junk_walk_config())?;
                let plan = builder::remove_folders_plan(&root, &walk, &names)?;
                deliver(&plan, apply, output)
            }
            CleanupCommands::FindMarkedDupes { root, suffix } => {
                let walk = snapshot(&root, WalkConfig::default())?;
                let hits = builder::find_marked_dupes(&walk, &suffix)?;
                report_marked(&hits, output);
                Ok(true)
            }
            CleanupCommands::Rename {
                root,
                no_recurse,
                zero_pad,
                apply,
            } => {
                let config = WalkConfig {
                    max_depth: if no_recurse { Some(1) } else { None },
                    ..WalkConfig::default()
                };
                let mut walk = snapshot(&root, config)?;
                media_sweeper::core::metadata::enrich_records(&mut walk.records, workers);
                let plan = builder::rename_plan(&root, &walk.records, zero_pad.clamp(3, 10))?;
                deliver(&plan, apply, output)
            }
            CleanupCommands::Sort {
                src,
                dst_root,
                strategy,
                relocate,
                apply,
            } => {
                let mut walk = snapshot(&src, WalkConfig::default())?;
                media_sweeper::core::metadata::enrich_records(&mut walk.records, workers);
                if matches!(output, OutputFormat::Pretty) {
                    let bare = walk
                        .records
                        .iter()
                        .filter(|r| !r.metadata.as_ref().is_some_and(|m| m.has_data()))
                        .count();
                    if bare > 0 {
                        Term::stderr()
                            .write_line(&format!(
                                "  {} of {} files carry no EXIF data; they sort by \
                                 modification time or into the Unknown bucket",
                                style(bare).yellow(),
                                walk.records.len()
                            ))
                            .ok();
                    }
                }
                let mode = if relocate {
                    MirrorMode::Move
                } else {
                    MirrorMode::Copy
                };
                let plan = builder::sort_plan(
                    &src,
                    &dst_root,
                    &walk.records,
                    strategy.into(),
                    &GridResolver,
                    mode,
                )?;
                deliver(&plan, apply, output)
            }
        },
    }
}

fn run_dedup(
    root: PathBuf,
    strategy: Strategy,
    move_to: Option<PathBuf>,
    config: EngineConfig,
    walk_config: WalkConfig,
    apply: bool,
    output: OutputFormat,
) -> Result<bool> {
    require_dir(&root)?;
    let (sender, receiver) = EventChannel::new();
    let listener = spawn_progress(receiver, matches!(output, OutputFormat::Pretty));

    let walker = TreeWalker::new(walk_config);
    let mut walk = walker.walk_with_events(&[root.clone()], &sender);
    if strategy == Strategy::Metadata {
        media_sweeper::core::metadata::enrich_records(&mut walk.records, config.workers);
    }

    let engine = FingerprintEngine::new(config.clone());
    let set = engine.fingerprint_all(&walk.records, strategy, &sender);
    drop(sender);
    listener.join().ok();

    let groups = grouper::group(&walk.records, &set);
    let plan = builder::dedup_plan(&root, &groups, move_to.as_deref(), config.verify_bytes)?;

    if matches!(output, OutputFormat::Pretty) {
        let term = Term::stderr();
        let duplicates: usize = groups.iter().map(|g| g.duplicates().len()).sum();
        let reclaimable: u64 = groups.iter().map(|g| g.reclaimable_bytes()).sum();
        term.write_line("").ok();
        term.write_line(&format!(
            "  {} files scanned, {} duplicate groups, {} duplicates, {} reclaimable",
            style(walk.records.len()).cyan(),
            style(groups.len()).cyan(),
            style(duplicates).cyan(),
            style(format_bytes(reclaimable)).yellow()
        ))
        .ok();
        if !set.skipped.is_empty() {
            term.write_line(&format!(
                "  {} files could not be fingerprinted and were excluded",
                style(set.skipped.len()).yellow()
            ))
            .ok();
        }
        for error in &walk.errors {
            term.write_line(&format!("  {} {}", style("scan:").yellow(), error))
                .ok();
        }
        term.write_line("").ok();
    }

    deliver(&plan, apply, output)
}

/// Walk configuration for the junk commands: everything, hidden files
/// included, because junk is usually a dotfile.
fn junk_walk_config() -> WalkConfig {
    WalkConfig {
        include_hidden: true,
        selection: Selection::All,
        ..WalkConfig::default()
    }
}

fn snapshot(root: &Path, config: WalkConfig) -> Result<WalkResult> {
    require_dir(root)?;
    let walker = TreeWalker::new(config);
    Ok(walker.walk(&[root.to_path_buf()]))
}

fn require_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(SweepError::Scan(ScanError::RootNotFound {
            path: path.to_path_buf(),
        }));
    }
    Ok(())
}

/// Print the plan, or execute it when `apply` is set. Returns false when
/// an applied plan had failures, so the process can exit non-zero.
fn deliver(plan: &Plan, apply: bool, output: OutputFormat) -> Result<bool> {
    if !apply {
        match output {
            OutputFormat::Pretty => {
                println!("{}", plan.render());
                let term = Term::stderr();
                term.write_line(&format!(
                    "{}",
                    style("Plan only; nothing was changed. Re-run with --apply to execute.")
                        .dim()
                ))
                .ok();
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(plan).unwrap_or_default());
            }
        }
        return Ok(true);
    }

    let (sender, receiver) = EventChannel::new();
    let listener = spawn_progress(receiver, matches!(output, OutputFormat::Pretty));
    let summary = PlanExecutor::execute(plan, &sender).map_err(SweepError::Plan)?;
    drop(sender);
    listener.join().ok();

    match output {
        OutputFormat::Pretty => print_summary(&summary),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).unwrap_or_default()
            );
        }
    }
    Ok(summary.ok())
}

fn print_summary(summary: &ApplySummary) {
    let term = Term::stderr();
    term.write_line("").ok();
    let mark = if summary.ok() {
        style("✓").green().bold()
    } else {
        style("✗").red().bold()
    };
    term.write_line(&format!("{} Apply complete", mark)).ok();
    term.write_line(&format!(
        "  {} succeeded, {} skipped, {} failed in {:.1}s",
        style(summary.succeeded).green(),
        style(summary.skipped).yellow(),
        style(summary.failed).red(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    for skip in &summary.skips {
        term.write_line(&format!(
            "  {} {} ({})",
            style("skipped:").yellow(),
            skip.path.display(),
            skip.reason
        ))
        .ok();
    }
    for failure in &summary.failures {
        term.write_line(&format!(
            "  {} {} ({})",
            style("failed:").red(),
            failure.path.display(),
            failure.message
        ))
        .ok();
    }
}

fn report_marked(hits: &[PathBuf], output: OutputFormat) {
    match output {
        OutputFormat::Pretty => {
            let term = Term::stderr();
            term.write_line(&format!(
                "  {} marked duplicate(s) found",
                style(hits.len()).cyan()
            ))
            .ok();
            for hit in hits {
                println!("{}", hit.display());
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(hits).unwrap_or_default()
            );
        }
    }
}

/// Handle events in a separate thread, driving a progress bar for pretty
/// output and dropping them otherwise.
fn spawn_progress(receiver: EventReceiver, pretty: bool) -> thread::JoinHandle<()> {
    let progress = if pretty {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress else { continue };
            match event {
                Event::Scan(ScanEvent::Progress(p)) => {
                    pb.set_message(format!("scanning ({} files)", p.files_found));
                }
                Event::Scan(ScanEvent::Completed { total_files }) => {
                    pb.set_length(total_files as u64);
                }
                Event::Fingerprint(FingerprintEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                    pb.set_message(
                        p.current_path
                            .file_name()
                            .unwrap_or_default()
                            .to_string_lossy()
                            .into_owned(),
                    );
                }
                Event::Fingerprint(FingerprintEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
                Event::Apply(ApplyEvent::Started { total_operations }) => {
                    pb.set_length(total_operations as u64);
                }
                Event::Apply(ApplyEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                    pb.set_message(
                        p.current_path
                            .file_name()
                            .unwrap_or_default()
                            .to_string_lossy()
                            .into_owned(),
                    );
                }
                Event::Apply(ApplyEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    })
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
