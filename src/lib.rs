//! # Edge-Sense Core Library
//!
//! This crate implements a real-time, multi-sensor activity-recognition
//! pipeline for an embedded device. It continuously samples a microphone, a
//! 3-axis accelerometer/gyroscope and a laser range finder, turns each raw
//! stream into frequency-domain feature windows, fuses the features into a
//! fixed-shape tensor, evaluates three independent binary classifiers against
//! that tensor and reports the fused decision to a remote endpoint. A
//! companion capture mode persists raw sensor data to disk for offline
//! training instead.
//!
//! ## Crate Structure
//!
//! - **`config`**: Strongly-typed settings loaded from `config.toml` and
//!   `EDGE_SENSE_*` environment variables. See [`config::Settings`].
//! - **`error`**: The crate-wide [`error::SenseError`] enum and the
//!   [`error::AppResult`] alias.
//! - **`telemetry`**: Structured logging setup on `tracing`.
//! - **`sensors`**: Capability traits for the physical sensor collaborators
//!   plus mock implementations for tests and headless runs.
//! - **`acquisition`**: The sensor acquisition stage. One task per sensor,
//!   ring-buffered motion windows, periodic snapshot publishing with a
//!   drop-on-full backpressure policy.
//! - **`dsp`**: The short-time Fourier transform power spectrum and column
//!   standardization used by the feature stages.
//! - **`features`**: The audio and motion feature stages.
//! - **`classifier`**: The `Classifier` capability trait, the per-cycle
//!   [`classifier::DecisionSet`] and stub implementations.
//! - **`fusion`**: The fusion/inference stage: hold-last ingest, tensor
//!   assembly, classifier evaluation and emission.
//! - **`report`**: Visualization downsampling and the HTTP report call.
//! - **`capture`**: Raw persistence mode (WAV + delimited text files).
//!
//! Data flows strictly downstream through bounded channels; no stage calls
//! back upstream. Producers never block on congested consumers: a full
//! channel drops the current publish, an empty channel leaves the consumer
//! working with its last-held value.

pub mod acquisition;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod dsp;
pub mod error;
pub mod features;
pub mod fusion;
pub mod report;
pub mod sensors;
pub mod telemetry;
