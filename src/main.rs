//! CLI entry point for edge-sense.
//!
//! Provides the two operating modes of the device software:
//!
//! - `run`: the live inference pipeline (acquisition, feature stages,
//!   fusion/inference, remote reporting), stopped with ctrl-c;
//! - `capture`: raw sensor persistence for offline training.
//!
//! The binary ships wired to mock sensors and stub classifiers; physical
//! drivers and trained models are external collaborators injected behind the
//! `sensors` and `classifier` capability traits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use edge_sense::acquisition::SensorAcquisition;
use edge_sense::capture::CaptureSession;
use edge_sense::classifier::{Classifier, ConstantClassifier};
use edge_sense::config::Settings;
use edge_sense::features::audio::AudioFeatureStage;
use edge_sense::features::motion::MotionFeatureStage;
use edge_sense::fusion::FusionInferenceStage;
use edge_sense::report::{ReportMode, Reporter};
use edge_sense::sensors::mock::{MockImu, MockMicrophone, MockRangeFinder};
use edge_sense::telemetry;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "edge-sense")]
#[command(about = "Real-time multi-sensor activity recognition", long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live inference pipeline until interrupted.
    Run {
        /// Disable the remote report call (offline inference).
        #[arg(long)]
        no_report: bool,
    },

    /// Record raw sensor captures for offline training.
    Capture {
        /// Activity label to record, overriding the configured one.
        #[arg(long)]
        activity: Option<String>,

        /// Recording duration in seconds, overriding the configured one.
        #[arg(long)]
        duration: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_from(&cli.config)?;
    settings.validate()?;
    telemetry::init_from_settings(&settings).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Run { no_report } => run_pipeline(settings, no_report).await,
        Commands::Capture { activity, duration } => {
            let mut settings = settings;
            if let Some(activity) = activity {
                settings.capture.activity = activity;
            }
            if let Some(duration) = duration {
                settings.capture.duration_secs = duration;
            }
            run_capture(settings).await
        }
    }
}

async fn run_pipeline(settings: Settings, no_report: bool) -> Result<()> {
    info!(app = %settings.application.name, "starting inference pipeline");

    let mic = Arc::new(MockMicrophone::with_format(
        settings.audio.chunk_size,
        settings.audio.sample_rate_hz,
    ));
    let imu = Arc::new(MockImu::new());
    let tof = Arc::new(MockRangeFinder::constant(50.0));

    // One snapshot channel per feature stage: each hand-off has exactly one
    // producer and one consumer.
    let capacity = settings.pipeline.channel_capacity;
    let (audio_snap_tx, audio_snap_rx) = mpsc::channel(capacity);
    let (motion_snap_tx, motion_snap_rx) = mpsc::channel(capacity);
    let (audio_feat_tx, audio_feat_rx) = mpsc::channel(capacity);
    let (motion_feat_tx, motion_feat_rx) = mpsc::channel(capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let acquisition = SensorAcquisition::new(mic, imu, tof, settings.clone());
    let acquisition_handle =
        acquisition.spawn(vec![audio_snap_tx, motion_snap_tx], shutdown_rx.clone());

    let audio_stage = AudioFeatureStage::new(settings.idle_sleep());
    let audio_handle = audio_stage.spawn(audio_snap_rx, audio_feat_tx, shutdown_rx.clone());

    let motion_stage = MotionFeatureStage::new(settings.idle_sleep());
    let motion_handle = motion_stage.spawn(motion_snap_rx, motion_feat_tx, shutdown_rx.clone());

    let classifiers: Vec<Arc<dyn Classifier>> = vec![
        Arc::new(ConstantClassifier::new("spin", 0.0)),
        Arc::new(ConstantClassifier::new("up", 0.0)),
        Arc::new(ConstantClassifier::new("down", 0.0)),
    ];
    let mut fusion = FusionInferenceStage::new(classifiers, settings.idle_sleep());
    if !no_report {
        fusion = fusion.with_reporter(Reporter::new(&settings.report, ReportMode::Inference)?);
    }
    let fusion_handle = fusion.spawn(audio_feat_rx, motion_feat_rx, shutdown_rx);

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    let _ = shutdown_tx.send(true);

    for handle in [acquisition_handle, audio_handle, motion_handle, fusion_handle] {
        if let Err(e) = handle.await {
            warn!(error = %e, "stage task ended abnormally");
        }
    }
    info!("pipeline stopped");
    Ok(())
}

async fn run_capture(settings: Settings) -> Result<()> {
    let mic = Arc::new(MockMicrophone::with_format(
        settings.audio.chunk_size,
        settings.audio.sample_rate_hz,
    ));
    let imu = Arc::new(MockImu::new());
    let session = CaptureSession::new(mic, imu, settings);
    session.run().await?;
    Ok(())
}
