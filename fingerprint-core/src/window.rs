//! Frame windowing.
//!
//! Converts one frame of PCM samples to normalized f64 and applies the
//! raised-cosine analysis window (`0.54 − 0.46·cos(2πn/N)`). The cosine
//! is advanced by an incremental angle-addition recurrence rather than a
//! transcendental call per sample; the recurrence is never
//! recanonicalized so windowed frames reproduce the calibrated pipeline
//! exactly.

use std::f64::consts::PI;

use once_cell::sync::Lazy;

use crate::FRAMES;
use crate::error::{FingerprintError, Result};

/// Recurrence coefficients for stepping cos/sin by 2π/FRAMES, derived
/// once: `a = 2·sin²(π/N)`, `b = sin(−2π/N)`.
static RECURRENCE: Lazy<(f64, f64)> = Lazy::new(|| {
    let half_step = PI / FRAMES as f64;
    (2.0 * half_step.sin().powi(2), (-2.0 * half_step).sin())
});

/// Windows one frame of 16-bit PCM into `dst`.
///
/// Samples are scaled to [−1, 1] by the full-scale amplitude before the
/// window is applied.
///
/// # Arguments
/// * `samples` - exactly [`FRAMES`] PCM values
/// * `dst` - output buffer of the same length, fully overwritten
///
/// # Returns
/// * `Err(InvalidFrameLength)` if either slice is not one frame long
pub fn window_i16(samples: &[i16], dst: &mut [f64]) -> Result<()> {
    if samples.len() != FRAMES || dst.len() != FRAMES {
        return Err(FingerprintError::InvalidFrameLength);
    }
    let (a, b) = *RECURRENCE;
    let mut cos_v = 1.0;
    let mut sin_v = 0.0;
    for (out, &sample) in dst.iter_mut().zip(samples) {
        let normalized = f64::from(sample) / 32768.0;
        *out = normalized * (0.54 - 0.46 * cos_v);

        let next_cos = cos_v - (a * cos_v + b * sin_v);
        sin_v += b * cos_v - a * sin_v;
        cos_v = next_cos;
    }
    Ok(())
}

/// Windows one frame of float PCM already normalized to [−1, 1].
///
/// The pass-through variant for embedders whose channel mixer hands
/// over f32; identical to [`window_i16`] apart from the scaling step.
pub fn window_f32(samples: &[f32], dst: &mut [f64]) -> Result<()> {
    if samples.len() != FRAMES || dst.len() != FRAMES {
        return Err(FingerprintError::InvalidFrameLength);
    }
    let (a, b) = *RECURRENCE;
    let mut cos_v = 1.0;
    let mut sin_v = 0.0;
    for (out, &sample) in dst.iter_mut().zip(samples) {
        *out = f64::from(sample) * (0.54 - 0.46 * cos_v);

        let next_cos = cos_v - (a * cos_v + b * sin_v);
        sin_v += b * cos_v - a * sin_v;
        cos_v = next_cos;
    }
    Ok(())
}
