//! Configuration system using Figment.
//!
//! This module provides strongly-typed configuration loading for the
//! pipeline. Configuration is loaded from:
//! 1. `config.toml` file (base configuration)
//! 2. Environment variables (prefixed with `EDGE_SENSE_`)
//!
//! # Example
//! ```no_run
//! use edge_sense::config::Settings;
//!
//! # fn main() -> Result<(), figment::Error> {
//! let settings = Settings::load()?;
//! println!("Audio chunk size: {}", settings.audio.chunk_size);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Application settings.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Microphone settings.
    #[serde(default)]
    pub audio: AudioConfig,
    /// Accelerometer/gyroscope settings.
    #[serde(default)]
    pub motion: MotionConfig,
    /// Laser range finder settings.
    #[serde(default)]
    pub range: RangeConfig,
    /// Stage hand-off settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Remote report endpoint settings.
    #[serde(default)]
    pub report: ReportConfig,
    /// Capture-mode (raw persistence) settings.
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Microphone sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    #[serde(default = "default_audio_rate")]
    pub sample_rate_hz: u32,
    /// Number of 16-bit samples per captured chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Accelerometer/gyroscope sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Ring-buffer capacity per axis.
    #[serde(default = "default_window_len")]
    pub window_len: usize,
    /// Pacing sleep between consecutive IMU reads, in microseconds.
    #[serde(default = "default_sample_interval_us")]
    pub sample_interval_us: u64,
    /// Nominal achieved sample rate in Hz, used by the feature transform.
    #[serde(default = "default_nominal_rate")]
    pub nominal_rate_hz: u32,
}

/// Laser range finder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeConfig {
    /// Readings averaged per trend update.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between consecutive readings, in milliseconds.
    #[serde(default = "default_reading_interval_ms")]
    pub reading_interval_ms: u64,
    /// Dead-band around the previous rolling mean, in sensor units.
    #[serde(default = "default_deadband")]
    pub deadband: f32,
}

/// Stage hand-off configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Snapshot publish period in milliseconds.
    #[serde(default = "default_publish_period_ms")]
    pub publish_period_ms: u64,
    /// Capacity of every inter-stage channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Idle sleep for consumers polling an empty channel, in milliseconds.
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

/// Remote report endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Target URL for the report call.
    #[serde(default = "default_report_url")]
    pub url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_report_timeout")]
    pub timeout_secs: u64,
}

/// Capture-mode configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Root directory for the dataset tree.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Dataset name (first path component under the output directory).
    #[serde(default = "default_dataset")]
    pub dataset: String,
    /// Activity label being recorded.
    #[serde(default = "default_activity")]
    pub activity: String,
    /// Recording duration in seconds.
    #[serde(default = "default_duration")]
    pub duration_secs: u64,
}

// Default value functions
fn default_app_name() -> String {
    "edge-sense".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_audio_rate() -> u32 {
    15_000
}

fn default_chunk_size() -> usize {
    7_500
}

fn default_window_len() -> usize {
    500
}

fn default_sample_interval_us() -> u64 {
    600
}

fn default_nominal_rate() -> u32 {
    1_000
}

fn default_batch_size() -> usize {
    10
}

fn default_reading_interval_ms() -> u64 {
    40
}

fn default_deadband() -> f32 {
    0.2
}

fn default_publish_period_ms() -> u64 {
    500
}

fn default_channel_capacity() -> usize {
    2
}

fn default_idle_sleep_ms() -> u64 {
    20
}

fn default_report_url() -> String {
    "http://127.0.0.1:8000/report".into()
}

fn default_report_timeout() -> u64 {
    20
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dataset")
}

fn default_dataset() -> String {
    "seat".into()
}

fn default_activity() -> String {
    "idle".into()
}

fn default_duration() -> u64 {
    10
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_audio_rate(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            window_len: default_window_len(),
            sample_interval_us: default_sample_interval_us(),
            nominal_rate_hz: default_nominal_rate(),
        }
    }
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            reading_interval_ms: default_reading_interval_ms(),
            deadband: default_deadband(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            publish_period_ms: default_publish_period_ms(),
            channel_capacity: default_channel_capacity(),
            idle_sleep_ms: default_idle_sleep_ms(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            url: default_report_url(),
            timeout_secs: default_report_timeout(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            dataset: default_dataset(),
            activity: default_activity(),
            duration_secs: default_duration(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            audio: AudioConfig::default(),
            motion: MotionConfig::default(),
            range: RangeConfig::default(),
            pipeline: PipelineConfig::default(),
            report: ReportConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from `config.toml` and environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific TOML file path.
    ///
    /// Environment variables prefixed with `EDGE_SENSE_` override file
    /// values; nested keys use `__` as the separator
    /// (e.g. `EDGE_SENSE_REPORT__URL`).
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("EDGE_SENSE_").split("__"))
            .extract()
    }

    /// Snapshot publish period as a [`Duration`].
    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.pipeline.publish_period_ms)
    }

    /// Consumer idle sleep as a [`Duration`].
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.pipeline.idle_sleep_ms)
    }

    /// Validate semantic constraints that parsing cannot catch.
    pub fn validate(&self) -> Result<(), crate::error::SenseError> {
        if self.audio.chunk_size == 0 {
            return Err(crate::error::SenseError::Configuration(
                "audio.chunk_size must be positive".into(),
            ));
        }
        if self.motion.window_len == 0 {
            return Err(crate::error::SenseError::Configuration(
                "motion.window_len must be positive".into(),
            ));
        }
        if self.range.batch_size == 0 {
            return Err(crate::error::SenseError::Configuration(
                "range.batch_size must be positive".into(),
            ));
        }
        if self.pipeline.channel_capacity == 0 {
            return Err(crate::error::SenseError::Configuration(
                "pipeline.channel_capacity must be positive".into(),
            ));
        }
        if self.range.deadband < 0.0 {
            return Err(crate::error::SenseError::Configuration(
                "range.deadband must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_hardware() {
        let settings = Settings::default();
        assert_eq!(settings.audio.sample_rate_hz, 15_000);
        assert_eq!(settings.audio.chunk_size, 7_500);
        assert_eq!(settings.motion.window_len, 500);
        assert_eq!(settings.range.batch_size, 10);
        assert!((settings.range.deadband - 0.2).abs() < f32::EPSILON);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [application]
            log_level = "debug"

            [audio]
            chunk_size = 1024
            "#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.application.log_level, "debug");
        assert_eq!(settings.audio.chunk_size, 1024);
        // Untouched sections keep their defaults.
        assert_eq!(settings.audio.sample_rate_hz, 15_000);
        assert_eq!(settings.pipeline.channel_capacity, 2);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.application.name, "edge-sense");
        assert_eq!(settings.report.timeout_secs, 20);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut settings = Settings::default();
        settings.pipeline.channel_capacity = 0;
        assert!(settings.validate().is_err());
    }
}
