//! Visualization downsampling and the remote report call.
//!
//! The dashboard behind the report endpoint renders small fixed-size blocks,
//! so each feature channel is reduced before transmission:
//!
//! - audio: drop the first 5 columns (128x35 -> 128x30), average adjacent
//!   row pairs (-> 64x30), then reduce the 30
//!   columns to 6 by averaging 5-column groups; finally every audio value is
//!   offset by +1.0 (the dashboard's expected display range).
//! - motion axes: drop the first column (128x7 -> 128x6), average adjacent
//!   row pairs (-> 64x6), transpose (-> 6x64) and take cumulative prefix
//!   means over prefixes of 2..=7 rows. The output rows overlap and are not
//!   independent; this matches what the dashboard was built against and must
//!   not be "fixed" into a disjoint reduction.
//! - range: the scalar trend encoding is tiled into a 6x64 block.
//!
//! All blocks are flattened row-major to 1-D sequences. The report itself is
//! an HTTP call with a JSON body and a 20-second timeout; failures are
//! surfaced to the caller, which logs and moves on.

use ndarray::Array2;
use serde::Serialize;
use std::time::Duration;

use crate::classifier::DecisionSet;
use crate::config::ReportConfig;
use crate::error::AppResult;
use crate::features::{FeatureWindow, MotionFeatures};

/// Rows in every reduced visualization block.
const VIZ_ROWS: usize = 6;

/// The structured payload carried by the report call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VizPayload {
    /// Reduced audio block, flattened 6x64.
    pub audio: Vec<f32>,
    /// Reduced accelerometer x block, flattened 6x64.
    pub x: Vec<f32>,
    /// Reduced accelerometer y block, flattened 6x64.
    pub y: Vec<f32>,
    /// Reduced accelerometer z block, flattened 6x64.
    pub z: Vec<f32>,
    /// Tiled range block, flattened 6x64.
    pub l: Vec<f32>,
    /// Labels of the classifiers that fired this cycle.
    pub labels: Vec<String>,
}

/// Average adjacent row pairs, halving the row count.
fn halve_rows(matrix: &Array2<f32>) -> Array2<f32> {
    let (rows, cols) = matrix.dim();
    let out_rows = rows / 2;
    Array2::from_shape_fn((out_rows, cols), |(r, c)| {
        (matrix[(2 * r, c)] + matrix[(2 * r + 1, c)]) / 2.0
    })
}

/// Reduce columns by averaging disjoint groups of `group` columns.
fn group_mean_cols(matrix: &Array2<f32>, group: usize) -> Array2<f32> {
    let (rows, cols) = matrix.dim();
    let out_cols = cols / group;
    Array2::from_shape_fn((rows, out_cols), |(r, g)| {
        let start = g * group;
        (start..start + group).map(|c| matrix[(r, c)]).sum::<f32>() / group as f32
    })
}

/// Cumulative prefix means over growing row prefixes of size 2..=rows+1.
///
/// Output row `i` is the mean of input rows `0..min(i + 2, rows)`. The rows
/// therefore overlap by construction.
fn prefix_mean_rows(matrix: &Array2<f32>, out_rows: usize) -> Array2<f32> {
    let (rows, cols) = matrix.dim();
    Array2::from_shape_fn((out_rows, cols), |(i, c)| {
        let take = (i + 2).min(rows);
        (0..take).map(|r| matrix[(r, c)]).sum::<f32>() / take as f32
    })
}

fn flatten(matrix: Array2<f32>) -> Vec<f32> {
    matrix.into_iter().collect()
}

/// Reduce one audio feature window to its flattened 6x64 block.
fn reduce_audio(audio: &FeatureWindow) -> Vec<f32> {
    let trimmed = audio.slice(ndarray::s![.., 5..]).to_owned();
    let halved = halve_rows(&trimmed);
    let grouped = group_mean_cols(&halved, 5);
    // Rows become the 6 frequency groups, columns the 64 time steps.
    let block = grouped.t().to_owned();
    flatten(block.mapv(|v| v + 1.0))
}

/// Reduce one motion-axis feature window to its flattened 6x64 block.
fn reduce_axis(axis: &FeatureWindow) -> Vec<f32> {
    let trimmed = axis.slice(ndarray::s![.., 1..]).to_owned();
    let halved = halve_rows(&trimmed);
    let transposed = halved.t().to_owned();
    flatten(prefix_mean_rows(&transposed, VIZ_ROWS))
}

/// Tile the range scalar into a flattened 6x64 block.
fn tile_range(range: &FeatureWindow) -> Vec<f32> {
    let scalar = range[(0, 0)];
    vec![scalar; VIZ_ROWS * 64]
}

/// Build the visualization payload for one inference cycle.
pub fn downsample(
    audio: &FeatureWindow,
    motion: &MotionFeatures,
    decisions: &DecisionSet,
) -> VizPayload {
    VizPayload {
        audio: reduce_audio(audio),
        x: reduce_axis(&motion.acc_x),
        y: reduce_axis(&motion.acc_y),
        z: reduce_axis(&motion.acc_z),
        l: tile_range(&motion.range),
        labels: decisions.fired_labels(),
    }
}

/// Which HTTP verb the report call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Live inference reporting (GET with JSON body).
    Inference,
    /// Capture-session reporting (POST).
    Capture,
}

/// HTTP client for the report endpoint.
pub struct Reporter {
    client: reqwest::Client,
    url: String,
    mode: ReportMode,
}

impl Reporter {
    /// Build a reporter from configuration.
    pub fn new(config: &ReportConfig, mode: ReportMode) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            mode,
        })
    }

    /// Send one payload; returns the response body text for logging.
    ///
    /// A connection failure or malformed response is an error for the caller
    /// to log; the pipeline never retries a report.
    pub async fn send(&self, payload: &VizPayload) -> AppResult<String> {
        let request = match self.mode {
            ReportMode::Inference => self.client.get(&self.url),
            ReportMode::Capture => self.client.post(&self.url),
        };
        let response = request.json(payload).send().await?;
        Ok(response.text().await?)
    }
}
