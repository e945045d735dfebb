//! CLI entry point for the ABET artifact tool.
//!
//! Provides subcommands for a full course run (artifact extraction, outcome
//! reports, publishing), roster classification, saving a course snapshot,
//! rebuilding outcome reports offline from a snapshot, and publishing a
//! course page module that links what a run published.

mod infra;

use crate::infra::canvas::{CanvasClient, CanvasFilesSink};
use crate::infra::s3::S3Sink;
use abet_artifacts::analyzers::analyzer::{OUTCOME_REPORTS_FOLDER, run};
use abet_artifacts::config::{
    CanvasConfig, DEFAULT_LOGIN_COLUMN, DEFAULT_OUTCOME_MARKER, DEFAULT_PLAN_COLUMN,
    DuplicatePolicy, OutcomeConfig, RosterColumns, RunConfig, Tasks,
};
use abet_artifacts::pages::publish_course_page;
use abet_artifacts::roster::{filter_roster, is_target_major, load_major_map, read_roster};
use abet_artifacts::services::{ArtifactSink, LmsApi, SnapshotLms, save_snapshot};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "abet_artifacts")]
#[command(about = "Collects ABET course artifacts and outcome reports from Canvas", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Destination {
    /// Upload into the course's Files area
    Canvas,
    /// Upload to an S3 bucket
    S3,
    /// Stage locally only
    None,
}

#[derive(Args)]
struct RosterArgs {
    /// Roster column holding the student login id
    #[arg(long, default_value = DEFAULT_LOGIN_COLUMN)]
    login_column: String,

    /// Roster column holding the plan of study
    #[arg(long, default_value = DEFAULT_PLAN_COLUMN)]
    plan_column: String,
}

impl RosterArgs {
    fn columns(&self) -> RosterColumns {
        RosterColumns {
            login: self.login_column.clone(),
            plan: self.plan_column.clone(),
        }
    }
}

#[derive(Args)]
struct OutcomeArgs {
    /// Marker a rubric criterion description must contain to count as an outcome
    #[arg(long, default_value = DEFAULT_OUTCOME_MARKER)]
    marker: String,

    /// List an assignment once per tagged criterion instead of once per outcome
    #[arg(long, default_value_t = false)]
    count_duplicates: bool,
}

impl OutcomeArgs {
    fn config(&self) -> OutcomeConfig {
        OutcomeConfig {
            marker: self.marker.clone(),
            duplicates: if self.count_duplicates {
                DuplicatePolicy::PerCriterion
            } else {
                DuplicatePolicy::Once
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract artifacts and build outcome reports for a course
    Process {
        #[arg(value_name = "COURSE_ID")]
        course_id: u64,

        /// Roster CSV used to attribute students to majors (required for outcome reports)
        #[arg(short, long)]
        roster: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = Tasks::All)]
        tasks: Tasks,

        /// Local directory files are staged in (cleared at the start of a run)
        #[arg(short, long, default_value = "temp_assignment_files")]
        staging_dir: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Destination::Canvas)]
        destination: Destination,

        /// Course to publish into, when different from COURSE_ID
        #[arg(long)]
        destination_course: Option<u64>,

        /// S3 bucket name (required with --destination s3)
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Gzip compress files before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Keep the staging directory after publishing
        #[arg(long, default_value_t = false)]
        keep_staging: bool,

        #[command(flatten)]
        roster_args: RosterArgs,

        #[command(flatten)]
        outcome_args: OutcomeArgs,
    },
    /// Classify a roster and optionally write the target-major rows to a new CSV
    Roster {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Write the filtered roster here
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        roster_args: RosterArgs,
    },
    /// Save a course, its assignments and submissions as JSON
    Snapshot {
        #[arg(value_name = "COURSE_ID")]
        course_id: u64,

        #[arg(short, long)]
        out: PathBuf,
    },
    /// Build a page linking a course's published files and add it to the semester module
    PublishModule {
        #[arg(value_name = "COURSE_ID")]
        course_id: u64,

        /// Course the files were published into, when different from COURSE_ID
        #[arg(long)]
        destination_course: Option<u64>,
    },
    /// Rebuild outcome reports from a saved snapshot, without network access
    OutcomesOffline {
        #[arg(value_name = "SNAPSHOT_DIR")]
        snapshot: PathBuf,

        #[arg(short, long)]
        roster: PathBuf,

        /// Output directory (cleared first)
        #[arg(short, long, default_value = "outcome_reports")]
        out: PathBuf,

        #[command(flatten)]
        roster_args: RosterArgs,

        #[command(flatten)]
        outcome_args: OutcomeArgs,
    },
}

/// Colored stderr plus a JSON daily-rolling log file. The returned guard
/// must live until exit so buffered file output is flushed.
fn init_logging() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/abet_artifacts.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("abet_artifacts.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("RUST_LOG")
                .from_env_lossy(),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::DEBUG.into())
                .with_env_var("RUST_LOG_JSON")
                .from_env_lossy(),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            course_id,
            roster,
            tasks,
            staging_dir,
            destination,
            destination_course,
            s3_bucket,
            gzip,
            keep_staging,
            roster_args,
            outcome_args,
        } => {
            let majors = match (&roster, tasks.outcomes()) {
                (Some(path), _) => load_major_map(path, &roster_args.columns())?,
                (None, true) => bail!("--roster is required when building outcome reports"),
                (None, false) => Default::default(),
            };

            let client = CanvasClient::new(CanvasConfig::from_env()?)?;
            let sink: Option<Box<dyn ArtifactSink>> = match destination {
                Destination::Canvas => Some(Box::new(CanvasFilesSink::new(
                    client.clone(),
                    destination_course.unwrap_or(course_id),
                ))),
                Destination::S3 => {
                    let bucket = s3_bucket.context("--s3-bucket is required with --destination s3")?;
                    Some(Box::new(S3Sink::from_env(bucket, gzip).await))
                }
                Destination::None => None,
            };

            let config = RunConfig {
                tasks,
                outcomes: outcome_args.config(),
                ..RunConfig::new(course_id, &staging_dir)
            };
            let summary = run(&client, sink.as_deref(), &config, &majors).await?;

            if sink.is_some() && !keep_staging {
                if let Err(e) = std::fs::remove_dir_all(&staging_dir) {
                    warn!(dir = %staging_dir.display(), error = %e, "Could not remove staging directory");
                }
            } else {
                info!(dir = %staging_dir.display(), files = summary.staged_files, "Files left in staging");
            }
        }
        Commands::Roster {
            file,
            out,
            roster_args,
        } => {
            let columns = roster_args.columns();
            let reader = std::fs::File::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let rows = read_roster(reader, &columns)?;

            let mut classified = 0;
            for row in &rows {
                let plan = row.plan.as_deref().unwrap_or("");
                if is_target_major(plan) {
                    classified += 1;
                    println!("{}\t{}", row.login_id.as_deref().unwrap_or(""), plan.trim());
                }
            }
            info!(rows = rows.len(), classified, "Roster classified");

            if let Some(out) = out {
                let reader = std::fs::File::open(&file)
                    .with_context(|| format!("opening {}", file.display()))?;
                let writer = std::fs::File::create(&out)
                    .with_context(|| format!("creating {}", out.display()))?;
                let written = filter_roster(reader, writer, &columns)?;
                info!(out = %out.display(), written, "Filtered roster written");
            }
        }
        Commands::Snapshot { course_id, out } => {
            let client = CanvasClient::new(CanvasConfig::from_env()?)?;
            save_snapshot(&client, course_id, &out).await?;
        }
        Commands::PublishModule {
            course_id,
            destination_course,
        } => {
            let client = CanvasClient::new(CanvasConfig::from_env()?)?;
            let published = publish_course_page(
                &client,
                &client,
                course_id,
                destination_course.unwrap_or(course_id),
                &client.config().base_url,
            )
            .await?;
            info!(
                module = %published.module.name,
                page = %published.page.url,
                folders = published.folders,
                files = published.files,
                "Course module updated"
            );
        }
        Commands::OutcomesOffline {
            snapshot,
            roster,
            out,
            roster_args,
            outcome_args,
        } => {
            let majors = load_major_map(&roster, &roster_args.columns())?;
            let lms = SnapshotLms::open(&snapshot)?;
            let course = lms.get_course(0).await?;

            let config = RunConfig {
                tasks: Tasks::Outcomes,
                outcomes: outcome_args.config(),
                ..RunConfig::new(course.id, &out)
            };
            let summary = run(&lms, None, &config, &majors).await?;
            info!(
                reports = summary.reports.len(),
                dir = %out.join(OUTCOME_REPORTS_FOLDER).display(),
                "Offline outcome reports written"
            );
        }
    }

    Ok(())
}
