//! CLI binary for webslides2pdf.
//!
//! A thin shim over the library crate: expand the given paths into a batch,
//! map flags to `ConversionConfig`, run one job per presentation and report
//! per-file results. A failing file never aborts the batch.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use webslides2pdf::pipeline::input::{discover_inputs, is_url, output_path_for, resolve_input};
use webslides2pdf::{
    convert_to_file, inspect, CaptureFormat, ConversionConfig, ConversionProgressCallback,
    ConversionStats, InspectionReport, ProgressCallback, Slides2PdfError,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One progress line per job inside a shared [`MultiProgress`].
///
/// Starts as a spinner while the presentation loads (`total == 0`) and
/// switches to a bar once the number of steps is known.
struct JobProgress {
    bar: ProgressBar,
}

impl JobProgress {
    fn new(multi: &MultiProgress, name: &str) -> Arc<Self> {
        let bar = multi.add(ProgressBar::new(0));
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix(name.to_string());
        bar.set_message("Waiting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:32.green/238}] {pos:>3}/{len} steps  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for JobProgress {
    fn on_progress(&self, current: usize, total: usize, message: &str) {
        if total > 0 && self.bar.length() != Some(total as u64) {
            self.activate_bar(total);
        }
        self.bar.set_position(current as u64);
        self.bar.set_message(message.to_string());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one presentation (writes talk.pdf next to talk.svg)
  slides2pdf talk.svg

  # Convert every .svg/.html/.htm directly inside a directory
  slides2pdf decks/

  # Lower resolution, smaller files
  slides2pdf -q 1 talk.svg

  # JPEG snapshots instead of PNG
  slides2pdf --jpeg=80 talk.svg

  # Slow machine: longer settle time and a retry per step
  slides2pdf --settle-ms 1500 --retries 2 talk.svg

  # Several presentations in parallel, one browser each
  slides2pdf --jobs 4 decks/*.svg

  # Show what would be captured, as JSON
  slides2pdf --inspect-only --json talk.svg

SUPPORTED PRESENTATIONS:
  Sozi       frame-based; one page per frame, in presentation order
  JessyInk   build-step; one page per slide state, starting with the
             unrevealed slide and adding one page per effect

QUALITY:
  -q sets the device pixel ratio. A 1024×768 presentation produces
  1024×768 pages at -q 1 and 4096×3072 pages at the default -q 4.

ENVIRONMENT VARIABLES:
  SLIDES2PDF_CHROME       Path to the Chrome/Chromium executable
  CHROME                  Same, lower priority
  PLAYWRIGHT_BROWSERS_PATH  Where to look for Playwright-managed Chromium
  RUST_LOG                Override log filtering (e.g. webslides2pdf=debug)

SETUP:
  A Chrome or Chromium installation is required. It is found on PATH, in
  the usual install locations, or in the Playwright browser cache.
"#;

/// Convert Sozi and JessyInk presentations to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "slides2pdf",
    version,
    about = "Convert Sozi and JessyInk presentations to PDF",
    long_about = "Convert animated web presentations (Sozi, JessyInk) to PDF by capturing \
every frame or build step in a headless browser. Each input name.ext produces name.pdf \
beside it; directories are expanded to the presentations they directly contain.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Presentation files, directories, or HTTP/HTTPS URLs.
    paths: Vec<String>,

    /// Capture scale (device pixel ratio), 1–8.
    #[arg(short, long, env = "SLIDES2PDF_QUALITY", default_value_t = 4,
          value_parser = clap::value_parser!(u8).range(1..=8))]
    quality: u8,

    /// Wait after each reload before the snapshot, in milliseconds.
    #[arg(long, env = "SLIDES2PDF_SETTLE_MS", default_value_t = 600)]
    settle_ms: u64,

    /// Bound on the initial load, in seconds.
    #[arg(long, env = "SLIDES2PDF_LOAD_TIMEOUT", default_value_t = 60)]
    load_timeout: u64,

    /// Bound on one capture step, in seconds.
    #[arg(long, env = "SLIDES2PDF_STEP_TIMEOUT", default_value_t = 30)]
    step_timeout: u64,

    /// Bound on a whole presentation, in seconds.
    #[arg(long, env = "SLIDES2PDF_JOB_TIMEOUT")]
    job_timeout: Option<u64>,

    /// Extra attempts for a failing step.
    #[arg(long, env = "SLIDES2PDF_RETRIES", default_value_t = 0)]
    retries: u32,

    /// Capture JPEG instead of PNG, with optional quality 1–100 (default 85).
    #[arg(long, value_name = "QUALITY", num_args = 0..=1, default_missing_value = "85",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg: Option<u8>,

    /// Chrome/Chromium executable to use.
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Presentations converted concurrently, each in its own browser.
    #[arg(short, long, env = "SLIDES2PDF_JOBS", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    jobs: u16,

    /// Detect and plan only; nothing is captured or written.
    #[arg(long)]
    inspect_only: bool,

    /// Print results as JSON on stdout.
    #[arg(long, env = "SLIDES2PDF_JSON")]
    json: bool,

    /// Disable progress bars.
    #[arg(long, env = "SLIDES2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDES2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long, env = "SLIDES2PDF_QUIET")]
    quiet: bool,
}

/// One presentation in the batch.
struct Job {
    input: String,
    output: PathBuf,
}

/// What happened to one job.
struct JobOutcome {
    job: Job,
    result: std::result::Result<ConversionStats, Slides2PdfError>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.paths.is_empty() {
        Cli::command().print_help().context("Failed to print help")?;
        return Ok(());
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when progress bars are active;
    // the bars provide all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Collect the batch ────────────────────────────────────────────────
    let jobs = collect_jobs(&cli.paths);
    if jobs.is_empty() {
        if !cli.quiet {
            eprintln!("No presentations found (expected .svg, .html or .htm files).");
        }
        return Ok(());
    }

    let config = build_config(&cli)?;

    let run = async {
        if cli.inspect_only {
            run_inspections(&cli, &jobs, &config).await
        } else {
            run_conversions(&cli, jobs, &config, show_progress).await
        }
    };

    tokio::select! {
        outcome = run => outcome,
        _ = tokio::signal::ctrl_c() => {
            // In-flight jobs are dropped here, which kills their browsers;
            // their temp files are never persisted.
            eprintln!("\n{} Interrupted", cyan("◆"));
            Ok(())
        }
    }
}

/// Expand CLI paths: URLs pass through, local paths go through discovery.
fn collect_jobs(paths: &[String]) -> Vec<Job> {
    let (urls, locals): (Vec<&String>, Vec<&String>) = paths.iter().partition(|p| is_url(p));

    let mut jobs: Vec<Job> = discover_inputs(&locals)
        .into_iter()
        .map(|path| Job {
            input: path.to_string_lossy().to_string(),
            output: output_path_for(&path),
        })
        .collect();

    for url in urls {
        let stem = resolve_input(url)
            .ok()
            .and_then(|r| r.stem())
            .unwrap_or_else(|| "presentation".to_string());
        jobs.push(Job {
            input: url.clone(),
            output: PathBuf::from(format!("{stem}.pdf")),
        });
    }
    jobs
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .quality_scale(cli.quality)
        .settle_delay_ms(cli.settle_ms)
        .load_timeout_secs(cli.load_timeout)
        .step_timeout_secs(cli.step_timeout)
        .job_timeout_secs(cli.job_timeout)
        .max_step_retries(cli.retries);

    if let Some(quality) = cli.jpeg {
        builder = builder.capture_format(CaptureFormat::Jpeg { quality });
    }
    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_executable(chrome);
    }

    builder.build().context("Invalid configuration")
}

async fn run_conversions(
    cli: &Cli,
    jobs: Vec<Job>,
    config: &ConversionConfig,
    show_progress: bool,
) -> Result<()> {
    let multi = MultiProgress::new();
    if !show_progress {
        multi.set_draw_target(ProgressDrawTarget::hidden());
    }
    let total_jobs = jobs.len();

    let outcomes: Vec<JobOutcome> = stream::iter(jobs.into_iter().map(|job| {
        let multi = multi.clone();
        let mut config = config.clone();
        async move {
            let progress = JobProgress::new(&multi, &display_name(&job.input));
            config.progress_callback = Some(progress.clone() as ProgressCallback);

            let result = convert_to_file(&job.input, &job.output, &config).await;
            progress.finish();

            if !cli.quiet && !cli.json {
                let line = match &result {
                    Ok(stats) => format!(
                        "{} {}  {} pages  {}  →  {}",
                        green("✔"),
                        job.input,
                        stats.page_count,
                        dim(&format!("{:.1}s", stats.total_duration_ms as f64 / 1000.0)),
                        bold(&job.output.display().to_string()),
                    ),
                    Err(e) => format!("{} {}  {}", red("✘"), job.input, red(&e.to_string())),
                };
                print_line(&multi, show_progress, line);
            }
            JobOutcome { job, result }
        }
    }))
    .buffer_unordered(cli.jobs as usize)
    .collect()
    .await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();

    if cli.json {
        let report: Vec<_> = outcomes.iter().map(outcome_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise results")?
        );
    } else if !cli.quiet && total_jobs > 1 {
        eprintln!(
            "{} {}/{} presentations converted{}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&(total_jobs - failed).to_string()),
            total_jobs,
            if failed > 0 {
                format!("  ({} failed)", red(&failed.to_string()))
            } else {
                String::new()
            },
        );
    }

    Ok(())
}

async fn run_inspections(cli: &Cli, jobs: &[Job], config: &ConversionConfig) -> Result<()> {
    let mut reports = Vec::with_capacity(jobs.len());

    for job in jobs {
        match inspect(&job.input, config).await {
            Ok(report) => {
                if !cli.json {
                    print_report(&report);
                }
                reports.push(json!({ "input": job.input, "report": report }));
            }
            Err(e) => {
                if !cli.json {
                    eprintln!("{} {}  {}", red("✘"), job.input, red(&e.to_string()));
                }
                reports.push(json!({ "input": job.input, "error": e.to_string() }));
            }
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise reports")?
        );
    }
    Ok(())
}

fn print_report(report: &InspectionReport) {
    let m = &report.metadata;
    println!("Source:       {}", report.source);
    println!("Kind:         {}", m.kind());
    if let Some(ref t) = m.title {
        println!("Title:        {}", t);
    }
    println!("Viewport:     {}x{}", m.viewport_width, m.viewport_height);
    println!("Steps:        {}", report.steps.len());
    for step in &report.steps {
        println!("  {:>4}  {}", step.index, step.target);
    }
    println!();
}

fn outcome_json(outcome: &JobOutcome) -> serde_json::Value {
    match &outcome.result {
        Ok(stats) => json!({
            "input": outcome.job.input,
            "output": outcome.job.output,
            "stats": stats,
        }),
        Err(e) => json!({
            "input": outcome.job.input,
            "error": e.to_string(),
        }),
    }
}

fn print_line(multi: &MultiProgress, show_progress: bool, line: String) {
    if show_progress {
        // Hidden draw targets drop println output, so only route through
        // the multi-bar while it is visible.
        let _ = multi.println(line);
    } else {
        eprintln!("{line}");
    }
}

/// File name for local paths, the URL otherwise.
fn display_name(input: &str) -> String {
    if is_url(input) {
        return input.to_string();
    }
    Path::new(input)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| input.to_string())
}
