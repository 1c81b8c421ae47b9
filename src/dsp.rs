//! Short-time Fourier transform and feature scaling.
//!
//! This module provides the frequency-domain transform shared by the audio
//! and motion feature stages. [`power_spectrum`] slides a Hann-windowed FFT
//! over the input with a configurable overlap and returns the one-sided
//! magnitude spectrum as a matrix of frequency bins (rows) by analysis
//! frames (columns). [`standardize_columns`] applies per-column zero-mean,
//! unit-variance scaling.
//!
//! The framing follows the usual centered-STFT convention: the signal is
//! zero-extended by half a segment on both ends and then zero-padded so the
//! final frame is complete. For the shipped window parameters this yields
//! exactly 35 frames for a 7500-sample audio chunk (overlap 32) and 7 frames
//! for a 500-sample motion window (overlap 160).

use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;

/// Compute the one-sided STFT magnitude spectrum of a signal.
///
/// # Arguments
///
/// * `signal` - Time-domain samples.
/// * `nperseg` - Segment length per FFT. Must be at least 2.
/// * `noverlap` - Samples shared between consecutive segments. Must be less
///   than `nperseg`.
///
/// # Returns
///
/// An `(nperseg / 2 + 1) x frames` matrix of magnitudes, scaled by the
/// window sum. Row 0 is the zero-frequency bin; callers that follow the
/// model contract drop it.
pub fn power_spectrum(signal: &[f32], nperseg: usize, noverlap: usize) -> Array2<f32> {
    assert!(nperseg >= 2, "Segment length must be at least 2");
    assert!(
        noverlap < nperseg,
        "Overlap must be less than segment length"
    );

    let step = nperseg - noverlap;

    // Hann window and its sum for magnitude scaling.
    let mut window = Vec::with_capacity(nperseg);
    for i in 0..nperseg {
        let val =
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (nperseg - 1) as f64).cos());
        window.push(val);
    }
    let window_sum: f64 = window.iter().sum();
    let scale = 1.0 / window_sum;

    // Center the signal, then pad so the last frame is complete.
    let half = nperseg / 2;
    let mut padded = Vec::with_capacity(signal.len() + nperseg + step);
    padded.resize(half, 0.0f64);
    padded.extend(signal.iter().map(|&s| f64::from(s)));
    padded.resize(padded.len() + half, 0.0);
    let remainder = (padded.len() - nperseg) % step;
    if remainder != 0 {
        padded.resize(padded.len() + step - remainder, 0.0);
    }

    let frames = (padded.len() - nperseg) / step + 1;
    let bins = nperseg / 2 + 1;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);

    let mut spectrum = Array2::<f32>::zeros((bins, frames));
    let mut buffer: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); nperseg];

    for frame in 0..frames {
        let start = frame * step;
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * window[i], 0.0);
        }
        fft.process(&mut buffer);
        for bin in 0..bins {
            spectrum[(bin, frame)] = (buffer[bin].norm() * scale) as f32;
        }
    }

    spectrum
}

/// Standardize each column to zero mean and unit variance, in place.
///
/// Uses population variance. A zero-variance column is centered but not
/// divided, so constant inputs stay finite.
pub fn standardize_columns(matrix: &mut Array2<f32>) {
    let rows = matrix.nrows();
    if rows == 0 {
        return;
    }
    for mut column in matrix.columns_mut() {
        let mean = column.iter().sum::<f32>() / rows as f32;
        let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / rows as f32;
        let std = var.sqrt();
        if std > 0.0 {
            column.mapv_inplace(|v| (v - mean) / std);
        } else {
            column.mapv_inplace(|v| v - mean);
        }
    }
}
