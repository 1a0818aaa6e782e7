use bubble_common::utils;
use clap::{Args, Parser, Subcommand};
use cli::{AppConfig, expand_inputs};
use color_eyre::eyre::{Result, bail, eyre};
use mask::PolygonSet;
use model_bridge::{BridgeFactory, ScriptDetector};
use orchestrator::{
    BatchEvent, ChannelSink, LifecycleState, Orchestrator, RunOptions, TaskSpec, UsageQuota,
};
use pipeline::{Detector, ProcessingMode, RasterRenderer, Renderer, load_records};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Translate the speech bubbles of comic pages", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, translate and re-letter a batch of pages
    Process(ProcessArgs),
    /// Export detected regions as editable polygons
    Regions {
        /// Page to run detection on
        image: PathBuf,
        /// Path to a TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for `<stem>.polygons.json` (defaults to `<output_dir>/regions`)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Draw a translations file onto a cleaned page
    Reinsert {
        /// Cleaned page
        #[arg(short, long)]
        image: PathBuf,
        /// Translations JSON written by `process`
        #[arg(short, long)]
        records: PathBuf,
        /// Where to save the lettered page
        #[arg(short, long)]
        output: PathBuf,
        /// Path to a TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the default configuration
    InitConfig {
        /// Destination, `.toml` or `.json`
        #[arg(default_value = "bubble.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ProcessArgs {
    /// Image files or directories of images
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Path to a TOML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output directory for cleaned, translations and final artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// full, clean-only or translate-only
    #[arg(short, long)]
    mode: Option<ProcessingMode>,
    /// Number of executors used for multi-image batches
    #[arg(short, long)]
    workers: Option<usize>,
    /// Directory of edited `<stem>.polygons.json` files used instead of detection
    #[arg(long)]
    polygons: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter))
        )
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let outcome = runtime.block_on(run(cli));
    // Timed-out pages leave their blocking thread behind; do not wait for it
    runtime.shutdown_background();
    outcome
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Process(args) => {
            process_images(args).await?;
        }
        Commands::Regions {
            image,
            config,
            output_dir,
        } => {
            export_regions(&image, config.as_deref(), output_dir.as_deref())?;
        }
        Commands::Reinsert {
            image,
            records,
            output,
            config,
        } => {
            reinsert(&image, &records, &output, config.as_deref())?;
        }
        Commands::InitConfig { path, force } => {
            init_config(&path, force)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Ok(AppConfig::from_file(path)?)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Attach `<dir>/<stem>.polygons.json` to the page when it exists
fn task_spec(image: PathBuf, polygons_dir: Option<&Path>) -> Result<TaskSpec> {
    let spec = TaskSpec::new(image);
    let Some(dir) = polygons_dir else {
        return Ok(spec);
    };

    let path = dir.join(format!("{}.polygons.json", utils::file_stem(&spec.source)));
    if !path.is_file() {
        return Ok(spec);
    }
    let set = PolygonSet::load(&path)?;
    info!("✏️ Using {} edited outlines from {:?}", set.polygons.len(), path);
    Ok(spec.with_polygons(set.polygons))
}

async fn process_images(args: ProcessArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(workers) = args.workers {
        config.batch.parallelism = workers;
    }

    let images = expand_inputs(&args.inputs)?;
    if images.is_empty() {
        bail!("No images found in {:?}", args.inputs);
    }
    let specs = images
        .into_iter()
        .map(|image| task_spec(image, args.polygons.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    let factory = Arc::new(BridgeFactory::new(config.bridge.clone(), config.pipeline.clone()));
    let (sink, mut events) = ChannelSink::new();
    let mut orchestrator = Orchestrator::new(factory, config.batch.clone()).with_sink(Arc::new(sink));
    if let Some(quota) = &config.quota {
        orchestrator = orchestrator.with_quota(Arc::new(UsageQuota::new(quota.clone())));
    }
    let orchestrator = Arc::new(orchestrator);

    let queued = orchestrator.add_tasks(specs)?;
    if queued == 0 {
        bail!("None of the inputs is a readable image");
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    info!("🎨 Processing {} pages ({}) into {:?}", queued, config.mode, config.output_dir);
    orchestrator.start(RunOptions::new(&config.output_dir, config.mode))?;

    let stopper = Arc::clone(&orchestrator);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight pages");
            if let Err(e) = stopper.stop() {
                warn!("Could not stop the batch: {}", e);
            }
        }
    });

    let snapshot = orchestrator.wait().await?;
    interrupt.abort();
    let _ = interrupt.await;

    let failures: Vec<_> = orchestrator
        .results()
        .into_iter()
        .filter(|summary| !summary.success)
        .collect();
    let remaining = orchestrator.pending_len();

    // Closes the notification channel so the printer drains and exits
    drop(orchestrator);
    printer.await?;

    for summary in &failures {
        error!(
            "  {:?} failed at {}: {}",
            summary.source,
            summary.failed_at.map(|stage| stage.to_string()).unwrap_or_default(),
            summary.error.as_deref().unwrap_or("unknown error")
        );
    }
    if remaining > 0 {
        warn!("{} pages were left unprocessed", remaining);
    }

    if snapshot.state == LifecycleState::Errored {
        return Err(eyre!("Batch aborted after {} pages", snapshot.processed));
    }

    info!(
        "📁 {} pages written to {:?}",
        snapshot.processed - snapshot.failed,
        config.output_dir
    );
    Ok(())
}

fn print_event(event: &BatchEvent) {
    match event {
        BatchEvent::Progress(snapshot) => {
            info!(
                "📊 {}/{} ({:.1}%) failed: {} skipped: {} eta: {}",
                snapshot.processed + snapshot.skipped,
                snapshot.total,
                snapshot.percent,
                snapshot.failed,
                snapshot.skipped,
                utils::format_duration(snapshot.remaining.as_secs_f64())
            );
        }
        BatchEvent::Status { message, .. } => {
            info!("🔄 {}", message);
        }
        BatchEvent::Error { source, detail } => match source {
            Some(source) => error!("❌ {:?}: {}", source, detail),
            None => error!("❌ {}", detail),
        },
    }
}

fn export_regions(image_path: &Path, config: Option<&Path>, output_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output_dir.join("regions"));

    info!("🔍 Detecting regions in {:?}", image_path);
    let image = image::open(image_path)?.to_rgb8();
    let detection = ScriptDetector::from_config(&config.bridge).detect(&image)?;

    let set = PolygonSet::from_detection(&detection, config.pipeline.outline_tolerance);
    utils::ensure_output_dir(&output_dir)?;
    let path = output_dir.join(format!("{}.polygons.json", utils::file_stem(image_path)));
    set.save(&path)?;

    info!("✅ Exported {} regions to {:?}", set.polygons.len(), path);
    Ok(())
}

fn reinsert(image_path: &Path, records_path: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    config.pipeline.validate()?;

    let image = image::open(image_path)?.to_rgb8();
    let records = load_records(records_path)?;
    let renderer = RasterRenderer::from_config(&config.pipeline);
    if !renderer.has_font() {
        bail!("No usable font found in {:?}", config.pipeline.font_paths);
    }

    let lettered = renderer.draw(&image, &records)?;
    if let Some(parent) = output.parent() {
        utils::ensure_output_dir(parent)?;
    }
    lettered.save(output)?;

    info!("✅ Drew {} bubbles onto {:?}", records.len(), output);
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists, use --force to overwrite", path);
    }
    AppConfig::default().to_file(path)?;
    info!("📄 Configuration saved to: {:?}", path);
    Ok(())
}
