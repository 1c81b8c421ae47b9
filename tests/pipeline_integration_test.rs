//! End-to-end tests for the streaming pipeline.
//!
//! These tests wire the real stages together over bounded channels, driving
//! them with mock sensors and stub classifiers, and verify the fused shapes,
//! the decision semantics and the failure behavior of the report call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use edge_sense::acquisition::{AudioWindow, RangeTrend, SensorAcquisition, SensorSnapshot};
use edge_sense::classifier::{Classifier, ConstantClassifier};
use edge_sense::config::Settings;
use edge_sense::features::audio::AudioFeatureStage;
use edge_sense::features::motion::MotionFeatureStage;
use edge_sense::fusion::FusionInferenceStage;
use edge_sense::report::{ReportMode, Reporter};
use edge_sense::sensors::mock::{MockImu, MockMicrophone, MockRangeFinder};

fn firing_classifiers() -> Vec<Arc<dyn Classifier>> {
    vec![
        Arc::new(ConstantClassifier::new("spin", 0.9)),
        Arc::new(ConstantClassifier::new("up", 0.9)),
        Arc::new(ConstantClassifier::new("down", 0.9)),
    ]
}

fn synthetic_snapshot() -> SensorSnapshot {
    SensorSnapshot {
        audio: AudioWindow {
            samples: vec![0i16; 7_500],
            sample_rate: 15_000,
        },
        acc_x: vec![0.0; 500],
        acc_y: vec![0.0; 500],
        acc_z: vec![0.0; 500],
        trend: RangeTrend::Steady,
    }
}

/// Scenario: zero audio, zero motion, steady trend and stub models at 0.9.
/// The pipeline must produce deterministic shapes and a fully-fired decision.
#[tokio::test]
async fn synthetic_input_yields_all_fired_decision() {
    let idle = Duration::from_millis(1);
    let (audio_snap_tx, audio_snap_rx) = mpsc::channel(2);
    let (motion_snap_tx, motion_snap_rx) = mpsc::channel(2);
    let (audio_feat_tx, audio_feat_rx) = mpsc::channel(2);
    let (motion_feat_tx, motion_feat_rx) = mpsc::channel(2);
    let (decision_tx, mut decision_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let audio_handle =
        AudioFeatureStage::new(idle).spawn(audio_snap_rx, audio_feat_tx, shutdown_rx.clone());
    let motion_handle =
        MotionFeatureStage::new(idle).spawn(motion_snap_rx, motion_feat_tx, shutdown_rx.clone());
    let fusion_handle = FusionInferenceStage::new(firing_classifiers(), idle)
        .with_decision_sink(decision_tx)
        .spawn(audio_feat_rx, motion_feat_rx, shutdown_rx);

    audio_snap_tx.send(synthetic_snapshot()).await.unwrap();
    motion_snap_tx.send(synthetic_snapshot()).await.unwrap();

    let decisions = tokio::time::timeout(Duration::from_secs(5), decision_rx.recv())
        .await
        .expect("decision within timeout")
        .expect("decision present");

    assert_eq!(decisions.verdicts.len(), 3);
    assert!(decisions.verdicts.iter().all(|v| v.fired));
    assert!(decisions.active);
    let labels: Vec<&str> = decisions.verdicts.iter().map(|v| v.label.as_str()).collect();
    assert_eq!(labels, vec!["spin", "up", "down"]);

    shutdown_tx.send(true).unwrap();
    for handle in [audio_handle, motion_handle, fusion_handle] {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

/// The full stack, mock sensors included, produces decisions and shuts down
/// with every sensor released.
#[tokio::test]
async fn full_pipeline_runs_and_releases_sensors() {
    let mut settings = Settings::default();
    settings.audio.chunk_size = 7_500;
    settings.motion.window_len = 500;
    settings.motion.sample_interval_us = 0;
    settings.range.reading_interval_ms = 1;
    settings.pipeline.publish_period_ms = 20;
    settings.pipeline.idle_sleep_ms = 1;

    let mic = Arc::new(MockMicrophone::with_format(7_500, 15_000));
    let imu = Arc::new(MockImu::new());
    let tof = Arc::new(MockRangeFinder::constant(50.0));

    let capacity = settings.pipeline.channel_capacity;
    let (audio_snap_tx, audio_snap_rx) = mpsc::channel(capacity);
    let (motion_snap_tx, motion_snap_rx) = mpsc::channel(capacity);
    let (audio_feat_tx, audio_feat_rx) = mpsc::channel(capacity);
    let (motion_feat_tx, motion_feat_rx) = mpsc::channel(capacity);
    let (decision_tx, mut decision_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let acquisition = SensorAcquisition::new(
        mic.clone(),
        imu.clone(),
        tof.clone(),
        settings.clone(),
    );
    let acquisition_handle =
        acquisition.spawn(vec![audio_snap_tx, motion_snap_tx], shutdown_rx.clone());
    let audio_handle = AudioFeatureStage::new(settings.idle_sleep()).spawn(
        audio_snap_rx,
        audio_feat_tx,
        shutdown_rx.clone(),
    );
    let motion_handle = MotionFeatureStage::new(settings.idle_sleep()).spawn(
        motion_snap_rx,
        motion_feat_tx,
        shutdown_rx.clone(),
    );
    let fusion_handle = FusionInferenceStage::new(firing_classifiers(), settings.idle_sleep())
        .with_decision_sink(decision_tx)
        .spawn(audio_feat_rx, motion_feat_rx, shutdown_rx);

    let decisions = tokio::time::timeout(Duration::from_secs(10), decision_rx.recv())
        .await
        .expect("decision within timeout")
        .expect("decision present");
    assert_eq!(decisions.verdicts.len(), 3);

    shutdown_tx.send(true).unwrap();
    for handle in [
        acquisition_handle,
        audio_handle,
        motion_handle,
        fusion_handle,
    ] {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    assert!(mic.stop_count() >= 1, "microphone must be released");
    assert!(imu.stop_count() >= 1, "imu must be released");
    assert!(tof.stop_count() >= 1, "range finder must be released");
}

/// A scripted range walk settles into Steady once consecutive batch means
/// stop moving beyond the dead-band.
#[tokio::test]
async fn range_trend_settles_on_constant_distance() {
    let mut settings = Settings::default();
    settings.audio.chunk_size = 64;
    settings.motion.window_len = 8;
    settings.motion.sample_interval_us = 100;
    settings.range.reading_interval_ms = 1;
    settings.pipeline.publish_period_ms = 10;

    let mut script = vec![5.0f32; 10];
    script.extend(std::iter::repeat(3.0).take(100));
    let tof = Arc::new(MockRangeFinder::scripted(script));

    let acquisition = SensorAcquisition::new(
        Arc::new(MockMicrophone::with_format(64, 15_000)),
        Arc::new(MockImu::new()),
        tof,
        settings,
    );
    let (tx, mut rx) = mpsc::channel(2);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = acquisition.spawn(vec![tx], shutdown_rx);

    let mut saw_steady = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(snapshot)) => {
                if snapshot.trend == RangeTrend::Steady {
                    saw_steady = true;
                    break;
                }
            }
            _ => break,
        }
    }
    assert!(saw_steady, "trend should settle to Steady on constant range");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}

/// Scenario: the report endpoint refuses connections. The fusion cycle must
/// complete, and the next cycle must proceed with intact channels.
#[tokio::test]
async fn report_failure_does_not_stall_the_pipeline() {
    let mut report = edge_sense::config::ReportConfig::default();
    // Port 9 (discard) on localhost: nothing listens there in CI.
    report.url = "http://127.0.0.1:9/report".into();
    report.timeout_secs = 1;
    let reporter = Reporter::new(&report, ReportMode::Inference).unwrap();

    let idle = Duration::from_millis(1);
    let (audio_snap_tx, audio_snap_rx) = mpsc::channel(2);
    let (motion_snap_tx, motion_snap_rx) = mpsc::channel(2);
    let (audio_feat_tx, audio_feat_rx) = mpsc::channel(2);
    let (motion_feat_tx, motion_feat_rx) = mpsc::channel(2);
    let (decision_tx, mut decision_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let audio_handle =
        AudioFeatureStage::new(idle).spawn(audio_snap_rx, audio_feat_tx, shutdown_rx.clone());
    let motion_handle =
        MotionFeatureStage::new(idle).spawn(motion_snap_rx, motion_feat_tx, shutdown_rx.clone());
    let fusion_handle = FusionInferenceStage::new(firing_classifiers(), idle)
        .with_decision_sink(decision_tx)
        .with_reporter(reporter)
        .spawn(audio_feat_rx, motion_feat_rx, shutdown_rx);

    audio_snap_tx.send(synthetic_snapshot()).await.unwrap();

    // Two consecutive cycles, each ending in a refused report call.
    for _ in 0..2 {
        motion_snap_tx.send(synthetic_snapshot()).await.unwrap();
        let decisions = tokio::time::timeout(Duration::from_secs(10), decision_rx.recv())
            .await
            .expect("cycle must complete despite report failure")
            .expect("decision present");
        assert!(decisions.active);
    }

    shutdown_tx.send(true).unwrap();
    for handle in [audio_handle, motion_handle, fusion_handle] {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
