//! Feature windows and the audio/motion feature stages.
//!
//! A feature window is a fixed-shape matrix of frequency bins (rows) by
//! analysis frames (columns), produced per input channel. The shipped model
//! contract fixes the shapes: audio windows are 128x35, each motion axis is
//! 128x7 and the range trend is broadcast into a 128x1 column.

pub mod audio;
pub mod motion;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Frequency-domain representation of one channel over one analysis window.
pub type FeatureWindow = Array2<f32>;

/// Frequency bins per feature window after the zero-frequency bin is dropped.
pub const FREQ_BINS: usize = 128;
/// STFT frames per audio window (7500 samples, segment 256, overlap 32).
pub const AUDIO_FRAMES: usize = 35;
/// STFT frames per motion-axis window (500 samples, segment 256, overlap 160).
pub const MOTION_FRAMES: usize = 7;
/// STFT segment length shared by both transforms.
pub const SEGMENT_LEN: usize = 256;
/// STFT overlap for the audio transform.
pub const AUDIO_OVERLAP: usize = 32;
/// STFT overlap for the motion transform.
pub const MOTION_OVERLAP: usize = 160;

/// The four-part motion feature bundle published by the motion stage.
#[derive(Debug, Clone)]
pub struct MotionFeatures {
    /// Accelerometer x-axis spectrum, 128x7.
    pub acc_x: FeatureWindow,
    /// Accelerometer y-axis spectrum, 128x7.
    pub acc_y: FeatureWindow,
    /// Accelerometer z-axis spectrum, 128x7.
    pub acc_z: FeatureWindow,
    /// Range trend broadcast column, 128x1.
    pub range: FeatureWindow,
}

/// Deterministic random-filled placeholder of the given shape.
///
/// The fusion stage starts from placeholders so it is never blocked waiting
/// for a first real window; it degrades to noise-in, low-confidence-out.
/// Seeding makes cold-start behavior reproducible across runs.
pub fn placeholder_window(rows: usize, cols: usize, seed: u64) -> FeatureWindow {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| rng.gen::<f32>())
}

/// Placeholder motion bundle for the fusion stage's cold start.
pub fn placeholder_motion(seed: u64) -> MotionFeatures {
    MotionFeatures {
        acc_x: placeholder_window(FREQ_BINS, MOTION_FRAMES, seed),
        acc_y: placeholder_window(FREQ_BINS, MOTION_FRAMES, seed.wrapping_add(1)),
        acc_z: placeholder_window(FREQ_BINS, MOTION_FRAMES, seed.wrapping_add(2)),
        range: placeholder_window(FREQ_BINS, 1, seed.wrapping_add(3)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_deterministic() {
        let a = placeholder_window(8, 3, 42);
        let b = placeholder_window(8, 3, 42);
        assert_eq!(a, b);
        let c = placeholder_window(8, 3, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn placeholder_motion_has_model_shapes() {
        let bundle = placeholder_motion(7);
        assert_eq!(bundle.acc_x.dim(), (FREQ_BINS, MOTION_FRAMES));
        assert_eq!(bundle.acc_y.dim(), (FREQ_BINS, MOTION_FRAMES));
        assert_eq!(bundle.acc_z.dim(), (FREQ_BINS, MOTION_FRAMES));
        assert_eq!(bundle.range.dim(), (FREQ_BINS, 1));
    }
}
