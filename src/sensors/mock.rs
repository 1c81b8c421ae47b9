//! Mock sensor implementations.
//!
//! Simulated devices for testing and headless runs without physical
//! hardware. All mocks use async-safe operations (`tokio::time::sleep`, not
//! `std::thread::sleep`) and interior mutability for state.
//!
//! # Available Mocks
//!
//! - [`MockMicrophone`] - seeded-noise audio chunks at a configurable rate
//! - [`MockImu`] - low-amplitude noise around gravity on the z axis
//! - [`MockRangeFinder`] - scripted or constant distance readings

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::time::{sleep, Duration};

use crate::sensors::{AudioCapture, MotionProbe, MotionSample, MotionSource, RangeFinder};

/// Mock microphone producing seeded uniform noise.
///
/// Chunks are generated instantly by default; an optional read delay
/// simulates the blocking cadence of a real stream.
pub struct MockMicrophone {
    chunk_size: usize,
    sample_rate: u32,
    read_delay: Duration,
    rng: Mutex<StdRng>,
    active: AtomicBool,
    stop_calls: AtomicU64,
}

impl MockMicrophone {
    /// Create a mock microphone with the shipped defaults (7500 @ 15 kHz).
    pub fn new() -> Self {
        Self::with_format(7_500, 15_000)
    }

    /// Create a mock microphone with a specific chunk size and rate.
    ///
    /// Reads block for one chunk duration, matching a real stream's cadence.
    pub fn with_format(chunk_size: usize, sample_rate: u32) -> Self {
        let read_delay = if sample_rate > 0 {
            Duration::from_secs_f64(chunk_size as f64 / f64::from(sample_rate))
        } else {
            Duration::ZERO
        };
        Self {
            chunk_size,
            sample_rate,
            read_delay,
            rng: Mutex::new(StdRng::seed_from_u64(0x5eed_0001)),
            active: AtomicBool::new(true),
            stop_calls: AtomicU64::new(0),
        }
    }

    /// Simulate the blocking duration of a real chunk read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// How many times `stop` has been called.
    pub fn stop_count(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioCapture for MockMicrophone {
    async fn read_chunk(&self) -> Result<Vec<i16>> {
        if !self.active.load(Ordering::SeqCst) {
            bail!("audio stream stopped");
        }
        if !self.read_delay.is_zero() {
            sleep(self.read_delay).await;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Ok((0..self.chunk_size)
            .map(|_| rng.gen_range(-256i16..=256i16))
            .collect())
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn stop(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock IMU producing small noise around a resting pose.
pub struct MockImu {
    rng: Mutex<StdRng>,
    stop_calls: AtomicU64,
}

impl MockImu {
    /// Create a mock IMU.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(0x5eed_0002)),
            stop_calls: AtomicU64::new(0),
        }
    }

    /// How many times `stop` has been called.
    pub fn stop_count(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockImu {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionProbe for MockImu {
    async fn read_sample(&self, source: MotionSource) -> Result<MotionSample> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let noise = |rng: &mut StdRng| rng.gen_range(-0.05f32..0.05f32);
        let z_rest = match source {
            MotionSource::Accelerometer => 1.0,
            MotionSource::Gyroscope => 0.0,
        };
        Ok(MotionSample {
            x: noise(&mut rng),
            y: noise(&mut rng),
            z: z_rest + noise(&mut rng),
        })
    }

    async fn stop(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock range finder replaying a scripted sequence of distances.
///
/// Once the script is exhausted the last value repeats. `data_ready` turns
/// false after `stop_ranging`, matching the hardware predicate.
pub struct MockRangeFinder {
    script: Mutex<VecDeque<f32>>,
    last: Mutex<f32>,
    ranging: AtomicBool,
    stop_calls: AtomicU64,
}

impl MockRangeFinder {
    /// Create a mock holding a constant distance.
    pub fn constant(distance: f32) -> Self {
        Self::scripted(vec![distance])
    }

    /// Create a mock replaying the given distances in order.
    pub fn scripted(distances: Vec<f32>) -> Self {
        let last = distances.last().copied().unwrap_or(0.0);
        Self {
            script: Mutex::new(distances.into()),
            last: Mutex::new(last),
            ranging: AtomicBool::new(true),
            stop_calls: AtomicU64::new(0),
        }
    }

    /// How many times `stop_ranging` has been called.
    pub fn stop_count(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RangeFinder for MockRangeFinder {
    async fn data_ready(&self) -> bool {
        self.ranging.load(Ordering::SeqCst)
    }

    async fn read_distance(&self) -> Result<f32> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        match script.pop_front() {
            Some(d) => {
                *self.last.lock().unwrap_or_else(|e| e.into_inner()) = d;
                Ok(d)
            }
            None => Ok(*self.last.lock().unwrap_or_else(|e| e.into_inner())),
        }
    }

    async fn stop_ranging(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.ranging.store(false, Ordering::SeqCst);
        Ok(())
    }
}
