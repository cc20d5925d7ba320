//! framemark - frame-accurate event labeling for folders of videos
//!
//! Command line front end for the framemark engine. Each subcommand opens a
//! workbench against the local collaborators, performs one operation and
//! waits for its label writes to land.
//!
//! Follows the XDG base directory layout for file locations:
//! - Config: $XDG_CONFIG_HOME/framemark/config.toml (~/.config/framemark/config.toml)
//! - Logs: $XDG_STATE_HOME/framemark/framemark.log (~/.local/state/framemark/framemark.log)
//! - Last folder: $XDG_STATE_HOME/framemark/recent.toml

mod probe;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use framemark_core::backend::{self, SystemTelemetry};
use framemark_core::format::{format_bytes, format_duration, format_epoch, format_span_seconds};
use framemark_core::{
    frame_at, CatalogSortKey, Config, EventZone, MarkOutcome, PersistStatus, RecentFolder,
    ScanProgress, SortDirection, StatsPoller, SummarySortKey, Workbench, WorkbenchOptions,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::probe::AssumedRateIndex;

#[derive(Parser)]
#[command(name = "framemark")]
#[command(about = "Mark events on the frames of a folder of videos")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a folder and list its videos
    Scan {
        /// Folder to scan (defaults to the last opened folder)
        dir: Option<PathBuf>,

        /// Sort key: name, duration or date
        #[arg(long, default_value = "name")]
        sort: CatalogSortKey,

        /// Sort in descending order
        #[arg(long)]
        desc: bool,
    },

    /// List the events recorded for a video
    Events {
        video: PathBuf,

        /// Show which events are active at this playback time (seconds)
        #[arg(long)]
        at: Option<f64>,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Record an event between two playback times
    Mark {
        video: PathBuf,

        /// Playback time of the start mark (seconds)
        #[arg(long)]
        from: f64,

        /// Playback time of the end mark (seconds)
        #[arg(long)]
        to: f64,

        /// Label for the event (defaults to labels.default_label)
        #[arg(long)]
        label: Option<String>,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Delete an event by its index
    Delete {
        video: PathBuf,

        index: usize,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Summarize every event in a folder
    Summary {
        /// Folder to summarize (defaults to the last opened folder)
        dir: Option<PathBuf>,

        /// Sort key: video, label, start or duration
        #[arg(long)]
        sort: Option<SummarySortKey>,

        /// Sort in descending order
        #[arg(long)]
        desc: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sample this process's resource usage
    Stats {
        /// Number of samples to print
        #[arg(long, default_value = "3")]
        samples: usize,
    },
}

#[derive(Args)]
struct ProbeArgs {
    /// Assume this frame rate instead of probing the video with ffprobe
    #[arg(long)]
    fps: Option<f64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = framemark_core::logging::init(&config.logging).with_context(|| {
        format!(
            "failed to initialize logging at {}",
            framemark_core::logging::log_file_path().display()
        )
    })?;

    tracing::info!("framemark starting");

    let result = match cli.command {
        Command::Scan { dir, sort, desc } => run_scan(&config, dir, sort, desc).await,
        Command::Events { video, at, probe } => run_events(&config, &video, at, &probe).await,
        Command::Mark {
            video,
            from,
            to,
            label,
            probe,
        } => run_mark(&config, &video, from, to, label, &probe).await,
        Command::Delete {
            video,
            index,
            probe,
        } => run_delete(&config, &video, index, &probe).await,
        Command::Summary {
            dir,
            sort,
            desc,
            json,
        } => run_summary(&config, dir, sort, desc, json).await,
        Command::Stats { samples } => run_stats(&config, samples).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "framemark failed");
    }
    result
}

// ============================================
// Setup helpers
// ============================================

fn workbench(config: &Config, probe: Option<&ProbeArgs>, label: Option<String>) -> Result<Workbench> {
    let mut services = backend::local_services(&config.media);

    if let Some(fps) = probe.and_then(|p| p.fps) {
        if !(fps.is_finite() && fps > 0.0) {
            bail!("--fps must be a positive number, got {}", fps);
        }
        services.index = AssumedRateIndex::wrap(services.index.clone(), fps);
    }

    let mut options = WorkbenchOptions::from(config);
    if let Some(label) = label {
        options.default_label = label;
    }
    Ok(Workbench::new(services, options))
}

/// DIR argument, or the remembered folder.
fn resolve_folder(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir,
        None => RecentFolder::default()
            .load()
            .context("no folder given and none remembered; pass a DIR")?,
    };
    std::fs::canonicalize(&dir).with_context(|| format!("folder not found: {}", dir.display()))
}

/// Scan `root` to completion behind a spinner. Returns the number of videos.
async fn scan_folder(bench: &mut Workbench, root: &Path) -> Result<usize> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("invalid spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut progress = bench.open_folder(root).await;
    if progress == ScanProgress::Idle {
        spinner.finish_and_clear();
        bail!("failed to scan {}", root.display());
    }

    while let ScanProgress::Scanning { entries } = progress {
        spinner.set_message(format!("Scanning {} ({} videos)", root.display(), entries));
        progress = bench.next_scan().await;
    }
    spinner.finish_and_clear();

    Ok(match progress {
        ScanProgress::Complete { entries } => entries,
        _ => bench.catalog().len(),
    })
}

/// Scan the video's folder and select the video.
async fn open_video(bench: &mut Workbench, video: &Path) -> Result<String> {
    let video = std::fs::canonicalize(video)
        .with_context(|| format!("video not found: {}", video.display()))?;
    let root = video.parent().context("video has no parent folder")?;
    scan_folder(bench, root).await?;

    let path = video
        .to_str()
        .context("video path is not valid UTF-8")?
        .to_string();
    if !bench.select_video(&path).await {
        bail!("{} is not a supported video file", video.display());
    }
    Ok(path)
}

/// Fail unless the last queued label write committed.
fn ensure_saved(bench: &Workbench) -> Result<()> {
    let id = bench.last_write().context("no label write was queued")?;
    match bench.persistence().status(id) {
        Some(PersistStatus::Committed) => Ok(()),
        Some(PersistStatus::Failed(message)) => bail!("failed to save labels: {}", message),
        _ => bail!("label write did not finish"),
    }
}

fn direction(desc: bool) -> SortDirection {
    if desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    }
}

// ============================================
// Subcommands
// ============================================

async fn run_scan(
    config: &Config,
    dir: Option<PathBuf>,
    sort: CatalogSortKey,
    desc: bool,
) -> Result<()> {
    let root = resolve_folder(dir)?;
    let mut bench = workbench(config, None, None)?;
    scan_folder(&mut bench, &root).await?;

    if let Err(e) = RecentFolder::default().save(&root) {
        tracing::warn!(error = %e, "Failed to remember folder");
    }

    bench.set_sort(sort, direction(desc));
    let videos = bench.sorted_videos();
    let labeled = videos.iter().filter(|v| v.is_labeled()).count();

    println!("Folder: {}", root.display());
    println!();
    println!("{:<40} {:>9} {:>7}  {}", "VIDEO", "DURATION", "EVENTS", "MODIFIED");
    for video in videos {
        println!(
            "{:<40} {:>9} {:>7}  {}",
            video.file_name(),
            format_duration(video.duration_sec),
            video.event_count,
            format_epoch(video.last_modified)
        );
    }
    println!();
    println!("{} videos, {} labeled", videos.len(), labeled);
    Ok(())
}

async fn run_events(
    config: &Config,
    video: &Path,
    at: Option<f64>,
    probe: &ProbeArgs,
) -> Result<()> {
    let mut bench = workbench(config, Some(probe), None)?;
    open_video(&mut bench, video).await?;
    let session = bench.session().context("no video selected")?;

    let rate = if session.has_frame_rate() {
        format!("{:.2} fps", session.fps)
    } else {
        "unknown fps".to_string()
    };
    println!(
        "{}  {}  {} frames  {}",
        session.entry.file_name(),
        rate,
        session.total_frames,
        format_duration(session.duration_secs)
    );
    if let Some(playable) = &session.playable {
        println!("Playable: {}", playable);
    }

    if session.events().is_empty() {
        println!("No events recorded.");
        return Ok(());
    }

    let frame = at.and_then(|t| frame_at(t, session.fps));
    println!();
    for (index, event) in session.events().iter().enumerate() {
        let zone = match frame.and_then(|f| event.zone_at(f)) {
            Some(EventZone::Active) => "  [active]",
            Some(EventZone::Warning) => "  [warning]",
            None => "",
        };
        println!(
            "#{:<3} {:<12} frames {}-{} (warning from {})  {}{}",
            index,
            event.label,
            event.start_frame,
            event.end_frame,
            event.before_start_frame,
            format_span_seconds(event.duration_frames(), session.fps),
            zone
        );
    }
    Ok(())
}

async fn run_mark(
    config: &Config,
    video: &Path,
    from: f64,
    to: f64,
    label: Option<String>,
    probe: &ProbeArgs,
) -> Result<()> {
    let mut bench = workbench(config, Some(probe), label)?;
    let path = open_video(&mut bench, video).await?;

    bench.on_time_update(from);
    match bench.toggle_mark() {
        MarkOutcome::Started { .. } => {}
        MarkOutcome::Ignored => bail!("frame rate of {} is unknown; pass --fps", path),
        other => bail!("unexpected recorder outcome: {:?}", other),
    }

    bench.on_time_update(to);
    let (index, event) = match bench.toggle_mark() {
        MarkOutcome::Recorded { index, event } => (index, event),
        MarkOutcome::Rejected {
            start_frame,
            end_frame,
        } => bail!(
            "end frame {} precedes start frame {}; nothing recorded",
            end_frame,
            start_frame
        ),
        other => bail!("unexpected recorder outcome: {:?}", other),
    };

    bench.flush().await;
    ensure_saved(&bench)?;

    println!(
        "Recorded event #{} ({}): frames {}-{}, warning from {}",
        index, event.label, event.start_frame, event.end_frame, event.before_start_frame
    );
    if let Some(file) = backend::label_path(Path::new(&path)) {
        println!("Saved {}", file.display());
    }
    Ok(())
}

async fn run_delete(config: &Config, video: &Path, index: usize, probe: &ProbeArgs) -> Result<()> {
    let mut bench = workbench(config, Some(probe), None)?;
    let path = open_video(&mut bench, video).await?;

    bench
        .delete_event(index)
        .with_context(|| format!("{} has no event #{}", path, index))?;
    bench.flush().await;
    ensure_saved(&bench)?;

    let remaining = bench.session().map_or(0, |s| s.events().len());
    println!("Deleted event #{}; {} remaining", index, remaining);
    Ok(())
}

async fn run_summary(
    config: &Config,
    dir: Option<PathBuf>,
    sort: Option<SummarySortKey>,
    desc: bool,
    json: bool,
) -> Result<()> {
    let root = resolve_folder(dir)?;
    let mut bench = workbench(config, None, None)?;
    if !bench.load_summary(&root).await {
        bail!("failed to load summary for {}", root.display());
    }
    if let Some(key) = sort {
        bench.select_summary_sort(key);
        bench.set_summary_direction(direction(desc));
    }

    let report = bench.summary().report().context("no summary loaded")?;
    let rows = bench.summary_rows();

    if json {
        let output = serde_json::json!({
            "total_videos": report.total_videos,
            "total_labeled_videos": report.total_labeled_videos,
            "total_events": report.total_events,
            "events": rows,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "Videos: {}  Labeled: {}  Events: {}",
        report.total_videos, report.total_labeled_videos, report.total_events
    );
    if rows.is_empty() {
        return Ok(());
    }
    println!();
    println!(
        "{:<40} {:<12} {:>8} {:>8} {:>9}",
        "VIDEO", "LABEL", "START", "END", "DURATION"
    );
    for row in rows {
        println!(
            "{:<40} {:<12} {:>8} {:>8} {:>9}",
            row.video_name,
            row.label,
            row.start_frame,
            row.end_frame,
            format_span_seconds(row.duration_frames(), row.fps)
        );
    }
    Ok(())
}

async fn run_stats(config: &Config, samples: usize) -> Result<()> {
    let mut poller = StatsPoller::spawn(
        Arc::new(SystemTelemetry::new()),
        config.telemetry.poll_interval(),
    );

    for _ in 0..samples {
        let stats = poller.next().await.context("telemetry stopped")?;
        println!(
            "cpu {:>5.1}%  memory {} / {}  gpu {:.0}%",
            stats.cpu_usage,
            format_bytes(stats.memory_usage),
            format_bytes(stats.total_memory),
            stats.gpu_usage
        );
    }
    Ok(())
}
