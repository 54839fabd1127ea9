//! thermoscan CLI: command-line interface for thermal anomaly detection and
//! feedback recalibration.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use thermoscan::{
    load_image, parse_detections, parse_edits, DetectConfig, Detection, DetectionReport,
    FaultCategory, Inspector, ThresholdStore,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "thermoscan")]
#[command(about = "Detect and classify heat anomalies in thermal images of electrical equipment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect anomalies in an image.
    Detect(CliDetectArgs),

    /// Replay reviewer edits and recalibrate the threshold file.
    Recalibrate(CliRecalibrateArgs),

    /// Classify reviewed boxes with the current thresholds.
    Suggest(CliSuggestArgs),

    /// Print the effective threshold set.
    Thresholds {
        /// Threshold file (defaults are used when it does not exist).
        #[arg(long)]
        thresholds: Option<PathBuf>,
    },

    /// Print the default detection config as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliEngineArgs {
    /// Threshold file (JSON); created on the first recalibration.
    #[arg(long)]
    thresholds: Option<PathBuf>,

    /// Detection config file (JSON); missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Right-hand fraction of the image excluded as legend.
    #[arg(long)]
    ignore_right_ratio: Option<f32>,
}

impl CliEngineArgs {
    fn to_inspector(&self) -> CliResult<Inspector> {
        let mut config = match &self.config {
            Some(path) => DetectConfig::from_json_file(path)?,
            None => DetectConfig::default(),
        };
        if let Some(ratio) = self.ignore_right_ratio {
            if !(0.0..1.0).contains(&ratio) {
                return Err(format!("--ignore-right-ratio must be in [0, 1), got {ratio}").into());
            }
            config.segment.ignore_right_ratio = ratio;
        }
        let store = open_store(self.thresholds.as_deref())?;
        Ok(Inspector::new(config, store))
    }
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the detection report (JSON).
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    engine: CliEngineArgs,
}

#[derive(Debug, Clone, Args)]
struct CliRecalibrateArgs {
    /// Image the detections were made on.
    #[arg(long)]
    image: PathBuf,

    /// Detections shown to the reviewer: a JSON array or a report from `detect`.
    #[arg(long)]
    detections: PathBuf,

    /// Reviewer edits (JSON array).
    #[arg(long)]
    edits: PathBuf,

    /// Path to write the feedback outcome (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    engine: CliEngineArgs,
}

#[derive(Debug, Clone, Args)]
struct CliSuggestArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Boxes to classify: a JSON array of detections or a report from `detect`.
    #[arg(long)]
    detections: PathBuf,

    /// Path to write the relabelled detections (JSON).
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    engine: CliEngineArgs,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Recalibrate(args) => run_recalibrate(&args),
        Commands::Suggest(args) => run_suggest(&args),
        Commands::Thresholds { thresholds } => run_thresholds(thresholds.as_deref()),
        Commands::DefaultConfig => run_default_config(),
    }
}

fn open_store(path: Option<&Path>) -> CliResult<ThresholdStore> {
    Ok(match path {
        Some(path) => ThresholdStore::open_json(path)?,
        None => ThresholdStore::default(),
    })
}

/// Detections from either a bare array or a `detect` report.
fn read_detections(path: &Path) -> CliResult<Vec<Detection>> {
    let text = std::fs::read_to_string(path)?;
    if let Ok(report) = serde_json::from_str::<DetectionReport>(&text) {
        return Ok(report.detections());
    }
    Ok(parse_detections(&text)?)
}

// ── detect ────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    let inspector = args.engine.to_inspector()?;
    let report = inspector.detect_file(&args.image)?;

    let [w, h] = report.image_size;
    tracing::info!("Image size: {}x{}", w, h);
    for a in &report.anomalies {
        tracing::info!(
            "  {:?} {} severity={:.4}",
            <[u32; 4]>::from(a.bbox),
            a.fault_type,
            a.severity
        );
    }

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());
    Ok(())
}

// ── recalibrate ───────────────────────────────────────────────────────

fn run_recalibrate(args: &CliRecalibrateArgs) -> CliResult<()> {
    if args.engine.thresholds.is_none() {
        tracing::warn!("no --thresholds file given; the recalibrated set will not be saved");
    }
    let inspector = args.engine.to_inspector()?;
    tracing::info!("Loading image: {}", args.image.display());
    let image = load_image(&args.image)?;
    let detections = read_detections(&args.detections)?;
    let edits = parse_edits(&std::fs::read_to_string(&args.edits)?)?;

    let outcome = inspector.submit_feedback(&image, &detections, &edits)?;
    tracing::info!(
        "{} edits applied, {} ignored",
        outcome.replay.applied,
        outcome.replay.ignored
    );
    match &outcome.recalibration {
        Some(r) if r.updated.is_empty() => {
            tracing::info!("thresholds v{}: no value changed", outcome.thresholds_version)
        }
        Some(r) => tracing::info!(
            "thresholds v{}: updated {}",
            outcome.thresholds_version,
            r.updated.join(", ")
        ),
        None => tracing::info!("thresholds unchanged"),
    }

    if let Some(out) = &args.out {
        std::fs::write(out, serde_json::to_string_pretty(&outcome)?)?;
        tracing::info!("Feedback outcome written to {}", out.display());
    }
    Ok(())
}

// ── suggest ───────────────────────────────────────────────────────────

fn run_suggest(args: &CliSuggestArgs) -> CliResult<()> {
    let inspector = args.engine.to_inspector()?;
    tracing::info!("Loading image: {}", args.image.display());
    let image = load_image(&args.image)?;
    let detections = read_detections(&args.detections)?;

    let mut changed = 0usize;
    let relabelled: Vec<Detection> = inspector
        .suggest_labels(&image, &detections)
        .into_iter()
        .map(|(mut d, c)| {
            let current = FaultCategory::from_label(&d.label);
            if current != Some(c.category) {
                changed += 1;
                match current {
                    Some(_) => tracing::info!(
                        "  {:?} {} -> {}",
                        <[u32; 4]>::from(d.bbox),
                        d.label,
                        c.category
                    ),
                    None => tracing::warn!(
                        "  {:?} unknown label {:?} -> {}",
                        <[u32; 4]>::from(d.bbox),
                        d.label,
                        c.category
                    ),
                }
            }
            d.label = c.category.label().to_string();
            d
        })
        .collect();

    std::fs::write(&args.out, serde_json::to_string_pretty(&relabelled)?)?;
    tracing::info!(
        "{} detections classified, {} relabelled, written to {}",
        relabelled.len(),
        changed,
        args.out.display()
    );
    Ok(())
}

// ── thresholds / default-config ───────────────────────────────────────

fn run_thresholds(path: Option<&Path>) -> CliResult<()> {
    let snapshot = open_store(path)?.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot.thresholds)?);
    Ok(())
}

fn run_default_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&DetectConfig::default())?);
    Ok(())
}
