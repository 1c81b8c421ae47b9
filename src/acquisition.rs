//! Sensor acquisition stage.
//!
//! Turns blocking, heterogeneous-rate sensor reads into a uniformly
//! publishable [`SensorSnapshot`] without letting any one sensor's pace
//! dictate the others'. One tokio task runs per sensor:
//!
//! - the microphone task replaces the current [`AudioWindow`] wholesale on
//!   every completed chunk read (most-recent-chunk-wins, no history);
//! - the motion task reads one accelerometer sample per iteration with a
//!   sub-millisecond pacing sleep and feeds a fixed-capacity ring per axis;
//! - the range task averages batches of distance readings and updates the
//!   [`RangeTrend`] against a dead-band;
//! - a publisher task, bound to no sensor's pace, pushes a snapshot copy
//!   downstream on a fixed period.
//!
//! The publisher uses `try_send`: a full channel drops the publish silently.
//! Producers never block and never queue unboundedly; a congested consumer
//! simply misses a tick. Sensor read errors stay local to their own loop.
//! On shutdown every sensor handle is released through its idempotent stop
//! operation before the stage task completes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::sensors::{AudioCapture, MotionProbe, MotionSource, RangeFinder};

/// Ternary trend of the laser range reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeTrend {
    /// The tracked object is getting closer.
    Approaching,
    /// The distance is holding within the dead-band.
    Steady,
    /// The tracked object is moving away.
    Receding,
}

impl RangeTrend {
    /// Classify the trend from the previous and current rolling means.
    ///
    /// The comparison uses strict inequalities: a delta exactly at the
    /// dead-band resolves to `Steady`.
    pub fn classify(previous: f32, current: f32, deadband: f32) -> Self {
        let delta = previous - current;
        if delta > deadband {
            RangeTrend::Approaching
        } else if delta < -deadband {
            RangeTrend::Receding
        } else {
            RangeTrend::Steady
        }
    }

    /// Numeric encoding fed to the classifiers.
    ///
    /// These exact values (0, 1, 2) are what the shipped models were
    /// trained against; do not renumber.
    pub fn encoded(self) -> f32 {
        match self {
            RangeTrend::Approaching => 0.0,
            RangeTrend::Steady => 1.0,
            RangeTrend::Receding => 2.0,
        }
    }
}

/// A full microphone capture window.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    /// Signed 16-bit samples; always exactly one chunk long.
    pub samples: Vec<i16>,
    /// Sample rate of the capture in Hz.
    pub sample_rate: u32,
}

/// Point-in-time copy of all current sensor state.
///
/// This is the only data that crosses from acquisition to the feature
/// stages. It is published by value, never shared, so a consumer can never
/// observe a torn write.
#[derive(Debug, Clone)]
pub struct SensorSnapshot {
    /// Most recent full audio window.
    pub audio: AudioWindow,
    /// Most recent accelerometer x-axis window, oldest sample first.
    pub acc_x: Vec<f32>,
    /// Most recent accelerometer y-axis window, oldest sample first.
    pub acc_y: Vec<f32>,
    /// Most recent accelerometer z-axis window, oldest sample first.
    pub acc_z: Vec<f32>,
    /// Current range trend.
    pub trend: RangeTrend,
}

/// Fixed-capacity sliding window over one motion axis.
///
/// Pushing into a full ring evicts exactly the oldest sample.
#[derive(Debug)]
pub struct AxisRing {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl AxisRing {
    /// Create a ring pre-filled to capacity with a placeholder value, so
    /// snapshots carry full-length windows before real data arrives.
    pub fn prefilled(capacity: usize, value: f32) -> Self {
        Self {
            samples: std::iter::repeat(value).take(capacity).collect(),
            capacity,
        }
    }

    /// Insert a sample, evicting the oldest when full.
    pub fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the ring holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Contiguous copy of the window, oldest first.
    pub fn to_vec(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }
}

/// Latest-known raw state, mutated only by the acquisition tasks.
struct LatestState {
    audio: AudioWindow,
    acc_x: AxisRing,
    acc_y: AxisRing,
    acc_z: AxisRing,
    trend: RangeTrend,
}

impl LatestState {
    fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            audio: self.audio.clone(),
            acc_x: self.acc_x.to_vec(),
            acc_y: self.acc_y.to_vec(),
            acc_z: self.acc_z.to_vec(),
            trend: self.trend,
        }
    }
}

/// The sensor acquisition stage.
///
/// Owns the sensor collaborators for the lifetime of the pipeline and is the
/// sole writer of all raw buffers.
pub struct SensorAcquisition {
    audio: Arc<dyn AudioCapture>,
    imu: Arc<dyn MotionProbe>,
    range: Arc<dyn RangeFinder>,
    settings: Settings,
}

impl SensorAcquisition {
    /// Create the stage around its sensor collaborators.
    pub fn new(
        audio: Arc<dyn AudioCapture>,
        imu: Arc<dyn MotionProbe>,
        range: Arc<dyn RangeFinder>,
        settings: Settings,
    ) -> Self {
        Self {
            audio,
            imu,
            range,
            settings,
        }
    }

    /// Spawn the acquisition tasks and the snapshot publisher.
    ///
    /// Each downstream feature stage gets its own channel, so every channel
    /// keeps exactly one producer and one consumer; the publisher pushes an
    /// independent snapshot copy into each, and a full channel drops only
    /// its own copy.
    ///
    /// The returned handle completes only after all sensor loops have exited
    /// and every sensor resource has been released.
    pub fn spawn(
        self,
        snapshot_txs: Vec<mpsc::Sender<SensorSnapshot>>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let chunk_size = self.audio.chunk_size();
        let sample_rate = self.audio.sample_rate();
        let state = Arc::new(Mutex::new(LatestState {
            audio: AudioWindow {
                // Raw placeholder, replaced by the first real chunk.
                samples: vec![1; chunk_size],
                sample_rate,
            },
            acc_x: AxisRing::prefilled(self.settings.motion.window_len, 1.0),
            acc_y: AxisRing::prefilled(self.settings.motion.window_len, 1.0),
            acc_z: AxisRing::prefilled(self.settings.motion.window_len, 1.0),
            trend: RangeTrend::Steady,
        }));

        let audio_task = tokio::spawn(audio_loop(
            self.audio.clone(),
            state.clone(),
            shutdown.clone(),
        ));
        let motion_task = tokio::spawn(motion_loop(
            self.imu.clone(),
            state.clone(),
            Duration::from_micros(self.settings.motion.sample_interval_us),
            shutdown.clone(),
        ));
        let range_task = tokio::spawn(range_loop(
            self.range.clone(),
            state.clone(),
            self.settings.range.clone(),
            shutdown.clone(),
        ));
        let publisher_task = tokio::spawn(publisher_loop(
            state,
            snapshot_txs,
            self.settings.publish_period(),
            shutdown,
        ));

        let audio = self.audio;
        let imu = self.imu;
        let range = self.range;
        tokio::spawn(async move {
            let _ = audio_task.await;
            let _ = motion_task.await;
            let _ = range_task.await;
            let _ = publisher_task.await;

            // Guaranteed-release path: every handle is stopped exactly here,
            // and every stop is idempotent.
            if let Err(e) = audio.stop().await {
                warn!(error = %e, "audio stream release failed");
            }
            if let Err(e) = imu.stop().await {
                warn!(error = %e, "imu release failed");
            }
            if let Err(e) = range.stop_ranging().await {
                warn!(error = %e, "range finder release failed");
            }
            info!("sensor acquisition stopped, resources released");
        })
    }
}

/// Wait until the shutdown flag flips or the sender disappears.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn audio_loop(
    audio: Arc<dyn AudioCapture>,
    state: Arc<Mutex<LatestState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let chunk_size = audio.chunk_size();
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            result = audio.read_chunk() => match result {
                Ok(chunk) => {
                    if chunk.len() != chunk_size {
                        warn!(got = chunk.len(), want = chunk_size, "short audio chunk dropped");
                        continue;
                    }
                    let mut latest = state.lock().unwrap_or_else(|e| e.into_inner());
                    // Whole-window swap; consumers never see a partial chunk.
                    latest.audio.samples = chunk;
                }
                Err(e) => {
                    warn!(error = %e, "audio read failed");
                    if !audio.is_active().await {
                        info!("audio stream no longer active, stopping audio loop");
                        break;
                    }
                }
            }
        }
    }
}

async fn motion_loop(
    imu: Arc<dyn MotionProbe>,
    state: Arc<Mutex<LatestState>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            result = imu.read_sample(MotionSource::Accelerometer) => match result {
                Ok(sample) => {
                    {
                        let mut latest = state.lock().unwrap_or_else(|e| e.into_inner());
                        latest.acc_x.push(sample.x);
                        latest.acc_y.push(sample.y);
                        latest.acc_z.push(sample.z);
                    }
                    tokio::time::sleep(interval).await;
                }
                Err(e) => {
                    warn!(error = %e, "imu read failed");
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
}

async fn range_loop(
    range: Arc<dyn RangeFinder>,
    state: Arc<Mutex<LatestState>>,
    config: crate::config::RangeConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let reading_interval = Duration::from_millis(config.reading_interval_ms);
    let mut last_distance = 0.0f32;

    while range.data_ready().await {
        if *shutdown.borrow() {
            break;
        }
        let mut readings = Vec::with_capacity(config.batch_size);
        for _ in 0..config.batch_size {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => return,
                result = range.read_distance() => match result {
                    Ok(d) => readings.push(d),
                    Err(e) => warn!(error = %e, "range read failed"),
                }
            }
            tokio::time::sleep(reading_interval).await;
        }
        if readings.is_empty() {
            continue;
        }
        let avg = readings.iter().sum::<f32>() / readings.len() as f32;
        let trend = RangeTrend::classify(last_distance, avg, config.deadband);
        last_distance = avg;
        state.lock().unwrap_or_else(|e| e.into_inner()).trend = trend;
        debug!(?trend, avg, "range trend updated");
    }
}

async fn publisher_loop(
    state: Arc<Mutex<LatestState>>,
    txs: Vec<mpsc::Sender<SensorSnapshot>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            _ = ticker.tick() => {
                let snapshot = state.lock().unwrap_or_else(|e| e.into_inner()).snapshot();
                let mut all_closed = true;
                for tx in &txs {
                    match tx.try_send(snapshot.clone()) {
                        Ok(()) => all_closed = false,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            // Backpressure policy: a congested consumer
                            // misses a tick, the others are unaffected.
                            debug!("snapshot channel full, publish dropped");
                            all_closed = false;
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {}
                    }
                }
                if all_closed {
                    info!("all snapshot channels closed, stopping publisher");
                    break;
                }
            }
        }
    }
}
