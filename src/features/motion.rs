//! Motion feature stage.
//!
//! Consumes [`SensorSnapshot`]s and computes the STFT power spectrum
//! (segment 256, overlap 160) of each accelerometer axis independently,
//! drops the zero-frequency bin and broadcasts the scalar range trend into a
//! 128-row column. The four-part [`MotionFeatures`] bundle is published
//! downstream under the same drop-on-full policy as the audio stage.
//!
//! Standardization is applied only on the training/offline path. The
//! inference path intentionally skips it: the shipped classifiers were
//! trained on unnormalized motion magnitudes, and scaling them here would
//! destroy the information they key on. This asymmetry with the audio stage
//! is deliberate.

use std::time::Duration;

use ndarray::Array2;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::acquisition::SensorSnapshot;
use crate::dsp;
use crate::features::{FeatureWindow, MotionFeatures, FREQ_BINS, MOTION_OVERLAP, SEGMENT_LEN};

/// The motion feature stage.
pub struct MotionFeatureStage {
    idle_sleep: Duration,
    normalize: bool,
}

impl MotionFeatureStage {
    /// Create the inference-path stage (no standardization).
    pub fn new(idle_sleep: Duration) -> Self {
        Self {
            idle_sleep,
            normalize: false,
        }
    }

    /// Create the training/offline-path stage (standardized features).
    pub fn normalizing(idle_sleep: Duration) -> Self {
        Self {
            idle_sleep,
            normalize: true,
        }
    }

    /// Spawn the stage loop.
    pub fn spawn(
        self,
        mut snapshot_rx: mpsc::Receiver<SensorSnapshot>,
        feature_tx: mpsc::Sender<MotionFeatures>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                match snapshot_rx.try_recv() {
                    Ok(snapshot) => {
                        let bundle = extract(&snapshot, self.normalize);
                        match feature_tx.try_send(bundle) {
                            Ok(()) => trace!("motion features published"),
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                debug!("motion feature channel full, bundle dropped");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                info!("motion feature channel closed, stopping stage");
                                break;
                            }
                        }
                    }
                    Err(mpsc::error::TryRecvError::Empty) => {
                        tokio::select! {
                            _ = tokio::time::sleep(self.idle_sleep) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        info!("snapshot channel closed, stopping motion stage");
                        break;
                    }
                }
            }
        })
    }
}

/// Transform one axis window into its trimmed spectrum.
fn axis_spectrum(samples: &[f32], normalize: bool) -> FeatureWindow {
    let spectrum = dsp::power_spectrum(samples, SEGMENT_LEN, MOTION_OVERLAP);
    let mut trimmed = spectrum.slice(ndarray::s![1.., ..]).to_owned();
    if normalize {
        dsp::standardize_columns(&mut trimmed);
    }
    trimmed
}

/// Build the four-part bundle from one snapshot.
fn extract(snapshot: &SensorSnapshot, normalize: bool) -> MotionFeatures {
    MotionFeatures {
        acc_x: axis_spectrum(&snapshot.acc_x, normalize),
        acc_y: axis_spectrum(&snapshot.acc_y, normalize),
        acc_z: axis_spectrum(&snapshot.acc_z, normalize),
        range: Array2::from_elem((FREQ_BINS, 1), snapshot.trend.encoded()),
    }
}
