//! Fusion and inference stage.
//!
//! Consumes the latest audio and motion feature windows, assembles the fused
//! tensor, evaluates every classifier against it and emits the resulting
//! [`DecisionSet`].
//!
//! Each cycle has two phases:
//!
//! 1. **Ingest**: both input channels are drained non-blockingly; a new item
//!    replaces the held window, an empty channel means the previous window is
//!    reused (hold-last, never wait).
//! 2. **Fuse + infer**: only a new motion bundle triggers inference; audio
//!    alone does not. The tensor is built in the fixed column order audio,
//!    x, y, z, range - any reordering breaks model compatibility.
//!
//! In reporting mode the cycle ends with a report call carrying the
//! downsampled visualization payload. Report failures are logged and the
//! cycle completes; decisions are time-perishable, so nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use ndarray::{Array2, Array3, Axis};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, DecisionSet};
use crate::error::{AppResult, SenseError};
use crate::features::{
    placeholder_motion, placeholder_window, FeatureWindow, MotionFeatures, AUDIO_FRAMES, FREQ_BINS,
    MOTION_FRAMES,
};
use crate::report::Reporter;

/// Total fused columns: audio(35) + x(7) + y(7) + z(7) + range(1).
pub const FUSED_COLS: usize = AUDIO_FRAMES + 3 * MOTION_FRAMES + 1;

/// Seed for the cold-start placeholder feature windows.
const PLACEHOLDER_SEED: u64 = 0x0b0e_0001;

/// The single concatenated input consumed identically by all classifiers in
/// one inference cycle. Shape is always 128x57x1.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedTensor(Array3<f32>);

impl FusedTensor {
    /// Horizontally concatenate the feature windows in the fixed model
    /// column order and add the trailing channel dimension.
    pub fn fuse(audio: &FeatureWindow, motion: &MotionFeatures) -> AppResult<Self> {
        check_shape("audio feature", audio, (FREQ_BINS, AUDIO_FRAMES))?;
        check_shape("acc_x feature", &motion.acc_x, (FREQ_BINS, MOTION_FRAMES))?;
        check_shape("acc_y feature", &motion.acc_y, (FREQ_BINS, MOTION_FRAMES))?;
        check_shape("acc_z feature", &motion.acc_z, (FREQ_BINS, MOTION_FRAMES))?;
        check_shape("range feature", &motion.range, (FREQ_BINS, 1))?;

        let merged = ndarray::concatenate(
            Axis(1),
            &[
                audio.view(),
                motion.acc_x.view(),
                motion.acc_y.view(),
                motion.acc_z.view(),
                motion.range.view(),
            ],
        )
        .map_err(|e| SenseError::Processing(format!("feature concatenation failed: {e}")))?;

        // (128, 57) -> (128, 57, 1): the models expect a trailing channel axis.
        Ok(Self(merged.insert_axis(Axis(2))))
    }

    /// Shape of the tensor, always `(128, 57, 1)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        self.0.dim()
    }

    /// View of the underlying volume.
    pub fn view(&self) -> ndarray::ArrayView3<'_, f32> {
        self.0.view()
    }
}

fn check_shape(
    context: &'static str,
    matrix: &Array2<f32>,
    expected: (usize, usize),
) -> AppResult<()> {
    if matrix.dim() != expected {
        return Err(SenseError::ShapeMismatch {
            context,
            expected: format!("{expected:?}"),
            actual: format!("{:?}", matrix.dim()),
        });
    }
    Ok(())
}

/// The fusion/inference stage.
pub struct FusionInferenceStage {
    classifiers: Vec<Arc<dyn Classifier>>,
    reporter: Option<Reporter>,
    decision_tx: Option<mpsc::Sender<DecisionSet>>,
    idle_sleep: Duration,
}

impl FusionInferenceStage {
    /// Create the stage with its classifier instances.
    pub fn new(classifiers: Vec<Arc<dyn Classifier>>, idle_sleep: Duration) -> Self {
        Self {
            classifiers,
            reporter: None,
            decision_tx: None,
            idle_sleep,
        }
    }

    /// Attach the report endpoint (inference/reporting mode).
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Attach a local decision sink (offline mode and tests).
    ///
    /// Decisions are pushed with the same drop-on-full policy as every other
    /// hand-off in the pipeline.
    pub fn with_decision_sink(mut self, tx: mpsc::Sender<DecisionSet>) -> Self {
        self.decision_tx = Some(tx);
        self
    }

    /// Spawn the stage loop.
    pub fn spawn(
        self,
        mut audio_rx: mpsc::Receiver<FeatureWindow>,
        mut motion_rx: mpsc::Receiver<MotionFeatures>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            // Hold-last state, seeded with deterministic placeholders so the
            // first cycles degrade to noise-in, low-confidence-out instead of
            // stalling.
            let mut held_audio =
                placeholder_window(FREQ_BINS, AUDIO_FRAMES, PLACEHOLDER_SEED);
            let mut held_motion = placeholder_motion(PLACEHOLDER_SEED.wrapping_add(16));

            loop {
                if *shutdown.borrow() {
                    break;
                }

                let mut audio_closed = false;
                let mut motion_closed = false;
                let mut motion_updated = false;

                // Ingest: drain both channels, most recent item wins.
                loop {
                    match audio_rx.try_recv() {
                        Ok(window) => held_audio = window,
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => {
                            audio_closed = true;
                            break;
                        }
                    }
                }
                loop {
                    match motion_rx.try_recv() {
                        Ok(bundle) => {
                            held_motion = bundle;
                            motion_updated = true;
                        }
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => {
                            motion_closed = true;
                            break;
                        }
                    }
                }

                if audio_closed && motion_closed && !motion_updated {
                    info!("feature channels closed, stopping fusion stage");
                    break;
                }

                // The motion channel gates the cycle; audio alone never
                // triggers inference.
                if !motion_updated {
                    tokio::select! {
                        _ = tokio::time::sleep(self.idle_sleep) => {}
                        _ = shutdown.changed() => {}
                    }
                    continue;
                }

                let tensor = match FusedTensor::fuse(&held_audio, &held_motion) {
                    Ok(tensor) => tensor,
                    Err(e) => {
                        warn!(error = %e, "tensor fusion failed, cycle skipped");
                        continue;
                    }
                };

                let mut confidences = Vec::with_capacity(self.classifiers.len());
                for classifier in &self.classifiers {
                    match classifier.evaluate(&tensor).await {
                        Ok(score) => confidences.push((classifier.label().to_string(), score)),
                        Err(e) => {
                            warn!(label = classifier.label(), error = %e, "classifier failed");
                            confidences.push((classifier.label().to_string(), 0.0));
                        }
                    }
                }
                let decisions = DecisionSet::from_confidences(confidences);
                debug!(active = decisions.active, "inference cycle complete");

                if let Some(tx) = &self.decision_tx {
                    match tx.try_send(decisions.clone()) {
                        Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            info!("decision sink closed, stopping fusion stage");
                            break;
                        }
                    }
                }

                if let Some(reporter) = &self.reporter {
                    let payload =
                        crate::report::downsample(&held_audio, &held_motion, &decisions);
                    // Decisions are time-perishable: failures are logged and
                    // never retried.
                    match reporter.send(&payload).await {
                        Ok(body) => debug!(response = %body, "report delivered"),
                        Err(e) => warn!(error = %e, "report call failed"),
                    }
                }
            }
        })
    }
}
