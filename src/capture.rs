//! Raw capture mode for offline training.
//!
//! Instead of running the inference pipeline, capture mode persists raw
//! sensor streams to disk for a configured duration:
//!
//! - microphone audio as a mono 16-bit WAV file under
//!   `<out>/<dataset>/mic/<activity>/`;
//! - accelerometer and gyroscope samples as delimited text files
//!   (`index, x, y, z` per line) under `acc/` and `gyr/`.
//!
//! Files are named `<timestamp>-<activity>` so repeated sessions for the
//! same activity never collide. The three recorders run concurrently; a
//! failure in one does not abort the others.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{AppResult, SenseError};
use crate::sensors::{AudioCapture, MotionProbe, MotionSample, MotionSource};

/// Timestamp format shared by all capture filenames.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%f";

/// A single recording session.
pub struct CaptureSession {
    audio: Arc<dyn AudioCapture>,
    imu: Arc<dyn MotionProbe>,
    settings: Settings,
}

impl CaptureSession {
    /// Create a session around the sensor collaborators.
    pub fn new(audio: Arc<dyn AudioCapture>, imu: Arc<dyn MotionProbe>, settings: Settings) -> Self {
        Self {
            audio,
            imu,
            settings,
        }
    }

    /// Record all sensors for the configured duration, then release them.
    pub async fn run(&self) -> AppResult<()> {
        let capture = &self.settings.capture;
        info!(
            activity = %capture.activity,
            dataset = %capture.dataset,
            duration_secs = capture.duration_secs,
            "capture session starting"
        );

        let audio_result = self.record_audio();
        let acc_result = self.record_motion(MotionSource::Accelerometer, "acc");
        let gyr_result = self.record_motion(MotionSource::Gyroscope, "gyr");
        let (audio_result, acc_result, gyr_result) =
            tokio::join!(audio_result, acc_result, gyr_result);

        for (name, result) in [
            ("audio", &audio_result),
            ("accelerometer", &acc_result),
            ("gyroscope", &gyr_result),
        ] {
            if let Err(e) = result {
                warn!(recorder = name, error = %e, "recorder failed");
            }
        }

        if let Err(e) = self.audio.stop().await {
            warn!(error = %e, "audio stream release failed");
        }
        if let Err(e) = self.imu.stop().await {
            warn!(error = %e, "imu release failed");
        }

        // Surface the first failure after all recorders have finished.
        audio_result.and(acc_result).and(gyr_result)
    }

    fn output_dir(&self, channel: &str) -> PathBuf {
        let capture = &self.settings.capture;
        capture
            .output_dir
            .join(&capture.dataset)
            .join(channel)
            .join(&capture.activity)
    }

    fn session_filename(&self, extension: &str) -> String {
        format!(
            "{}-{}.{}",
            Local::now().format(TIMESTAMP_FORMAT),
            self.settings.capture.activity,
            extension
        )
    }

    async fn record_audio(&self) -> AppResult<()> {
        let chunk_size = self.audio.chunk_size();
        let sample_rate = self.audio.sample_rate();
        let total_samples =
            self.settings.capture.duration_secs as usize * sample_rate as usize;
        let chunks = total_samples.div_ceil(chunk_size).max(1);

        let mut frames: Vec<i16> = Vec::with_capacity(chunks * chunk_size);
        for _ in 0..chunks {
            match self.audio.read_chunk().await {
                Ok(chunk) => frames.extend_from_slice(&chunk),
                Err(e) => {
                    warn!(error = %e, "audio chunk read failed during capture");
                    if !self.audio.is_active().await {
                        break;
                    }
                }
            }
        }

        if frames.is_empty() {
            return Err(SenseError::Sensor(
                "audio stream ended before any chunk was captured".into(),
            ));
        }

        let dir = self.output_dir("mic");
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(self.session_filename("wav"));
        write_wav(&path, &frames, sample_rate)?;
        info!(path = %path.display(), samples = frames.len(), "audio capture written");
        Ok(())
    }

    async fn record_motion(&self, source: MotionSource, channel: &str) -> AppResult<()> {
        let interval = Duration::from_micros(self.settings.motion.sample_interval_us);
        let total = self.settings.capture.duration_secs as usize
            * self.settings.motion.nominal_rate_hz as usize;

        let mut samples = Vec::with_capacity(total);
        for _ in 0..total {
            match self.imu.read_sample(source).await {
                Ok(sample) => samples.push(sample),
                Err(e) => warn!(error = %e, ?source, "imu read failed during capture"),
            }
            tokio::time::sleep(interval).await;
        }

        let dir = self.output_dir(channel);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(self.session_filename("txt"));
        write_axis_log(&path, &samples).await?;
        info!(path = %path.display(), samples = samples.len(), "motion capture written");
        Ok(())
    }
}

/// Write samples as a mono 16-bit WAV file.
pub fn write_wav(path: &std::path::Path, samples: &[i16], sample_rate: u32) -> AppResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write motion samples as `index, x, y, z` lines.
pub async fn write_axis_log(
    path: &std::path::Path,
    samples: &[MotionSample],
) -> AppResult<()> {
    let mut file = tokio::fs::File::create(path).await.map_err(SenseError::Io)?;
    let mut contents = String::with_capacity(samples.len() * 32);
    for (index, sample) in samples.iter().enumerate() {
        contents.push_str(&format!(
            "{}, {}, {}, {}\r\n",
            index, sample.x, sample.y, sample.z
        ));
    }
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
