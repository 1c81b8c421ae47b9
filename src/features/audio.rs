//! Audio feature stage.
//!
//! Consumes [`SensorSnapshot`]s, computes the STFT power spectrum of the
//! audio window (segment 256, overlap 32), drops the zero-frequency bin,
//! standardizes each frame column and publishes the resulting 128x35
//! [`FeatureWindow`].
//!
//! The loop polls its input non-blockingly and operates on whatever the
//! latest snapshot is when it wakes; an empty input means a short idle sleep,
//! a full output means the window is dropped.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::acquisition::SensorSnapshot;
use crate::dsp;
use crate::features::{FeatureWindow, AUDIO_OVERLAP, SEGMENT_LEN};

/// The audio feature stage.
pub struct AudioFeatureStage {
    idle_sleep: Duration,
}

impl AudioFeatureStage {
    /// Create the stage with the given idle sleep for empty-input polls.
    pub fn new(idle_sleep: Duration) -> Self {
        Self { idle_sleep }
    }

    /// Spawn the stage loop.
    pub fn spawn(
        self,
        mut snapshot_rx: mpsc::Receiver<SensorSnapshot>,
        feature_tx: mpsc::Sender<FeatureWindow>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                match snapshot_rx.try_recv() {
                    Ok(snapshot) => {
                        let feature = extract(&snapshot);
                        match feature_tx.try_send(feature) {
                            Ok(()) => trace!("audio feature published"),
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                debug!("audio feature channel full, window dropped");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                info!("audio feature channel closed, stopping stage");
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
                        info!("snapshot channel closed, stopping audio stage");
                        break;
                    }
                }
            }
        })
    }
}

/// Transform one snapshot's audio window into a standardized spectrum.
fn extract(snapshot: &SensorSnapshot) -> FeatureWindow {
    let samples: Vec<f32> = snapshot
        .audio
        .samples
        .iter()
        .map(|&s| f32::from(s))
        .collect();
    let spectrum = dsp::power_spectrum(&samples, SEGMENT_LEN, AUDIO_OVERLAP);
    // Drop the zero-frequency bin; the models never saw it.
    let mut trimmed = spectrum.slice(ndarray::s![1.., ..]).to_owned();
    dsp::standardize_columns(&mut trimmed);
    trimmed
}
