//! Sensor capability traits.
//!
//! This module defines the contracts for the physical sensor collaborators.
//! Instead of one monolithic driver trait, each sensor exposes the small
//! capability the pipeline actually needs:
//!
//! - [`AudioCapture`] - blocking chunk reads from a microphone
//! - [`MotionProbe`] - single-sample reads from an accelerometer or gyroscope
//! - [`RangeFinder`] - distance reads with a data-ready predicate
//!
//! Each capability trait:
//! - Is async (uses `#[async_trait]`)
//! - Is thread-safe (requires `Send + Sync`)
//! - Uses `anyhow::Result` for errors
//! - Guarantees its `stop()`/release operation is idempotent
//!
//! Driver internals are out of scope for this crate; the shipped binary and
//! the test suite run against the [`mock`] implementations.

pub mod mock;

use anyhow::Result;
use async_trait::async_trait;

/// One three-axis reading from an inertial sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// X-axis value in device-native units.
    pub x: f32,
    /// Y-axis value in device-native units.
    pub y: f32,
    /// Z-axis value in device-native units.
    pub z: f32,
}

/// Which inertial source produced a [`MotionSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionSource {
    /// The accelerometer registers.
    Accelerometer,
    /// The gyroscope registers.
    Gyroscope,
}

/// Capability: microphone chunk capture.
///
/// # Contract
/// - `read_chunk` blocks (in driver terms) until a full chunk of signed
///   16-bit samples is available and always returns exactly `chunk_size`
///   samples on success.
/// - `is_active` reports whether the stream is still delivering data.
/// - `stop` releases the stream and is idempotent.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Read the next full chunk of samples.
    async fn read_chunk(&self) -> Result<Vec<i16>>;

    /// Number of samples per chunk.
    fn chunk_size(&self) -> usize;

    /// Sample rate of the stream in Hz.
    fn sample_rate(&self) -> u32;

    /// Whether the stream is still active.
    async fn is_active(&self) -> bool;

    /// Stop the stream and release the device. Idempotent.
    async fn stop(&self) -> Result<()>;
}

/// Capability: inertial single-sample reads.
///
/// # Contract
/// - `read_sample` returns the most recent reading from the given source;
///   pacing between reads is the caller's responsibility.
/// - `stop` powers the device down and is idempotent.
#[async_trait]
pub trait MotionProbe: Send + Sync {
    /// Read one sample from the requested source.
    async fn read_sample(&self, source: MotionSource) -> Result<MotionSample>;

    /// Stop the device. Idempotent.
    async fn stop(&self) -> Result<()>;
}

/// Capability: laser distance measurement.
///
/// # Contract
/// - `data_ready` reports whether the sensor is ranging and has a reading
///   available; acquisition loops run only while this holds.
/// - `read_distance` returns the current distance in sensor units
///   (centimeters for the shipped VL53L1X-class part).
/// - `stop_ranging` halts ranging and is idempotent. The hardware must not
///   be left in a ranging state on shutdown.
#[async_trait]
pub trait RangeFinder: Send + Sync {
    /// Whether a new reading is available.
    async fn data_ready(&self) -> bool;

    /// Read the current distance.
    async fn read_distance(&self) -> Result<f32>;

    /// Stop ranging. Idempotent.
    async fn stop_ranging(&self) -> Result<()>;
}
