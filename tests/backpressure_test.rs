//! Integration tests for the backpressure and hold-last policies.
//!
//! Producers must never block on a congested consumer: a full channel drops
//! the current publish and leaves the channel contents unchanged. Consumers
//! must never block on an empty channel: the fusion stage reuses its
//! last-held feature windows until a new one arrives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ndarray::Array2;
use tokio::sync::{mpsc, watch};

use edge_sense::acquisition::{SensorAcquisition, SensorSnapshot};
use edge_sense::classifier::Classifier;
use edge_sense::config::Settings;
use edge_sense::features::{MotionFeatures, AUDIO_FRAMES, FREQ_BINS, MOTION_FRAMES};
use edge_sense::fusion::FusedTensor;
use edge_sense::fusion::FusionInferenceStage;
use edge_sense::sensors::mock::{MockImu, MockMicrophone, MockRangeFinder};

/// Classifier that records the audio block of every tensor it sees.
struct AudioBlockProbe {
    seen: Arc<Mutex<Vec<Vec<f32>>>>,
}

#[async_trait]
impl Classifier for AudioBlockProbe {
    fn label(&self) -> &str {
        "probe"
    }

    async fn evaluate(&self, tensor: &FusedTensor) -> Result<f32> {
        let view = tensor.view();
        let audio_block: Vec<f32> = (0..AUDIO_FRAMES).map(|c| view[(0, c, 0)]).collect();
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(audio_block);
        Ok(0.9)
    }
}

fn motion_bundle(fill: f32) -> MotionFeatures {
    MotionFeatures {
        acc_x: Array2::from_elem((FREQ_BINS, MOTION_FRAMES), fill),
        acc_y: Array2::from_elem((FREQ_BINS, MOTION_FRAMES), fill),
        acc_z: Array2::from_elem((FREQ_BINS, MOTION_FRAMES), fill),
        range: Array2::from_elem((FREQ_BINS, 1), 1.0),
    }
}

/// If no new audio window arrives across consecutive inference cycles, the
/// fused tensor must carry the identical audio block each time.
#[tokio::test]
async fn fusion_holds_last_audio_across_cycles() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe: Vec<Arc<dyn Classifier>> = vec![Arc::new(AudioBlockProbe { seen: seen.clone() })];

    let (audio_tx, audio_rx) = mpsc::channel(2);
    let (motion_tx, motion_rx) = mpsc::channel(2);
    let (decision_tx, mut decision_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stage = FusionInferenceStage::new(probe, Duration::from_millis(1))
        .with_decision_sink(decision_tx);
    let handle = stage.spawn(audio_rx, motion_rx, shutdown_rx);

    // One audio window, then three motion-gated cycles with no audio update.
    audio_tx
        .send(Array2::from_elem((FREQ_BINS, AUDIO_FRAMES), 0.75f32))
        .await
        .unwrap();
    for i in 0..3 {
        motion_tx.send(motion_bundle(i as f32)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), decision_rx.recv())
            .await
            .expect("cycle completes")
            .expect("decision present");
    }

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();

    let seen = seen.lock().unwrap_or_else(|e| e.into_inner());
    assert_eq!(seen.len(), 3);
    // The first cycle may or may not have drained the audio window yet,
    // depending on scheduling; once seen, it must be held unchanged.
    assert_eq!(seen[1], seen[2], "held audio must be reused bit-for-bit");
    assert!(
        seen[2].iter().all(|&v| (v - 0.75).abs() < f32::EPSILON),
        "held audio should be the last real window"
    );
}

/// A stalled consumer never blocks the snapshot publisher and never causes
/// queue growth: only the buffered item survives.
#[tokio::test]
async fn stalled_consumer_never_blocks_the_publisher() {
    let mut settings = Settings::default();
    settings.audio.chunk_size = 64;
    settings.motion.window_len = 8;
    settings.motion.sample_interval_us = 100;
    settings.range.reading_interval_ms = 1;
    settings.pipeline.publish_period_ms = 5;

    let acquisition = SensorAcquisition::new(
        Arc::new(MockMicrophone::with_format(64, 15_000)),
        Arc::new(MockImu::new()),
        Arc::new(MockRangeFinder::constant(10.0)),
        settings,
    );

    let (tx, mut rx) = mpsc::channel::<SensorSnapshot>(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = acquisition.spawn(vec![tx], shutdown_rx);

    // Let the publisher tick many times against the full channel.
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();

    let mut buffered = 0;
    while rx.try_recv().is_ok() {
        buffered += 1;
    }
    assert_eq!(buffered, 1, "drops must leave the channel contents unchanged");
}

/// With two downstream channels, congestion on one must not starve the other.
#[tokio::test]
async fn congested_channel_does_not_starve_its_sibling() {
    let mut settings = Settings::default();
    settings.audio.chunk_size = 64;
    settings.motion.window_len = 8;
    settings.motion.sample_interval_us = 100;
    settings.range.reading_interval_ms = 1;
    settings.pipeline.publish_period_ms = 5;

    let acquisition = SensorAcquisition::new(
        Arc::new(MockMicrophone::with_format(64, 15_000)),
        Arc::new(MockImu::new()),
        Arc::new(MockRangeFinder::constant(10.0)),
        settings,
    );

    let (stalled_tx, _stalled_rx) = mpsc::channel::<SensorSnapshot>(1);
    let (live_tx, mut live_rx) = mpsc::channel::<SensorSnapshot>(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = acquisition.spawn(vec![stalled_tx, live_tx], shutdown_rx);

    // The live consumer keeps draining; it must keep receiving snapshots
    // even though its sibling has been full since the first tick.
    let mut received = 0;
    for _ in 0..5 {
        let snapshot = tokio::time::timeout(Duration::from_secs(5), live_rx.recv())
            .await
            .expect("live channel keeps flowing")
            .expect("snapshot present");
        assert_eq!(snapshot.audio.samples.len(), 64);
        received += 1;
    }
    assert_eq!(received, 5);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}
