//! # Chroma Extraction Module
//!
//! This module folds FFT spectra into a running chromagram: a sequence of
//! 12-dimensional pitch-class energy vectors, one per analysis frame.
//!
//! ## Features
//! - Precomputed bin→note table (base frequency 440/16 Hz, octave-folded)
//! - Ring buffer of the 8 most recent per-note energy vectors
//! - 5-tap temporal filter + L2 normalization per emitted row
//! - Silence guard writing all-zero rows below a fixed energy floor

use once_cell::sync::Lazy;

use crate::{FRAMES, NOTES, SAMPLE_RATE};

/// Imaginary parts of the transformed frame live at this offset.
const IM_OFFSET: usize = FRAMES / 2;

/// Analysis band: FFT bins below ~27 Hz and above ~3.5 kHz carry no
/// usable pitch-class information at this sample rate and are skipped.
const NOTE_FREQUENCY_START: usize = 10;
const NOTE_FREQUENCY_END: usize = 1308;

/// Base frequency the octave folding is anchored to (A0 = 440/16 Hz).
const BASE_FREQUENCY: f64 = 440.0 / 16.0;

/// Ring depth: the temporal filter looks 5 frames back, rounded up to a
/// power of two so the write index wraps with a mask.
const SLOTS: usize = 8;

/// Temporal filter applied across the 5 most recent ring slots.
const FILTER: [f64; 5] = [0.25, 0.75, 1.0, 0.75, 0.25];

/// Rows whose L2 norm falls below this floor are written as silence.
const SILENCE_THRESHOLD: f64 = 0.01;

/// Maximum chromagram rows a session can produce: one per processed
/// frame at the 120-second budget.
const MAX_ROWS: usize = 967;

/// Maps every analysis-band FFT bin to its pitch class, built once per
/// process. Entries outside the band stay 0 and are never read.
static BINS_TO_NOTES: Lazy<[u8; NOTE_FREQUENCY_END]> = Lazy::new(|| {
    let mut table = [0u8; NOTE_FREQUENCY_END];
    for (bin, note) in table
        .iter_mut()
        .enumerate()
        .skip(NOTE_FREQUENCY_START)
    {
        let frequency = bin as f64 * f64::from(SAMPLE_RATE) / FRAMES as f64;
        let octave = (frequency / BASE_FREQUENCY).log2();
        *note = (NOTES as f64 * (octave - octave.floor())) as u8;
    }
    table
});

/// Accumulates chromagram rows across one fingerprinting session.
pub struct Chroma {
    note_buffer: [f64; SLOTS * NOTES],
    note_buffer_index: usize,
    /// Warm-up counter: starts at 1 and saturates at 5. Rows are only
    /// emitted once the ring holds enough history for the full filter,
    /// i.e. from the fifth processed frame on.
    coeff: u32,
    image: Vec<f64>,
    rows: usize,
}

impl Chroma {
    pub fn new() -> Self {
        Chroma {
            note_buffer: [0.0; SLOTS * NOTES],
            note_buffer_index: 0,
            coeff: 1,
            image: Vec::with_capacity(MAX_ROWS * NOTES),
            rows: 0,
        }
    }

    /// Folds one transformed frame into the session state.
    ///
    /// `spectrum` is the frame buffer after the forward FFT: real part
    /// of bin `k` at `spectrum[k]`, imaginary part at
    /// `spectrum[IM_OFFSET + k]`.
    pub fn feed(&mut self, spectrum: &[f64]) {
        debug_assert_eq!(spectrum.len(), FRAMES);

        let slot = self.note_buffer_index * NOTES;
        self.note_buffer[slot..slot + NOTES].fill(0.0);

        for bin in NOTE_FREQUENCY_START..NOTE_FREQUENCY_END {
            let note = BINS_TO_NOTES[bin] as usize;
            let re = spectrum[bin];
            let im = spectrum[bin + IM_OFFSET];
            self.note_buffer[slot + note] += re * re + im * im;
        }

        self.note_buffer_index = (self.note_buffer_index + 1) & (SLOTS - 1);

        if self.coeff >= 5 {
            self.emit_row();
        } else {
            self.coeff += 1;
        }
    }

    /// Number of chromagram rows emitted so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Consumes the extractor and hands out the raw chromagram for the
    /// one-time integral transform.
    pub fn finish(self) -> (Vec<f64>, usize) {
        (self.image, self.rows)
    }

    /// Runs the 5-tap filter over the most recent ring history,
    /// normalizes, and appends one row. The oldest slot the filter
    /// touches sits 5 steps behind the (already advanced) write index.
    fn emit_row(&mut self) {
        let oldest = (self.note_buffer_index + SLOTS - 5) & (SLOTS - 1);

        let mut filtered = [0.0; NOTES];
        let mut energy = 0.0;
        for (note, value) in filtered.iter_mut().enumerate() {
            for (tap, coefficient) in FILTER.iter().enumerate() {
                let slot = ((oldest + tap) & (SLOTS - 1)) * NOTES + note;
                *value += self.note_buffer[slot] * coefficient;
            }
            energy += *value * *value;
        }

        let norm = energy.sqrt();
        if norm < SILENCE_THRESHOLD {
            self.image.extend_from_slice(&[0.0; NOTES]);
        } else {
            self.image.extend(filtered.iter().map(|v| v / norm));
        }
        self.rows += 1;
    }
}

impl Default for Chroma {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::RealFft;
    use crate::window;
    use std::f64::consts::PI;

    #[test]
    fn bin_table_covers_all_pitch_classes() {
        for bin in NOTE_FREQUENCY_START..NOTE_FREQUENCY_END {
            assert!((BINS_TO_NOTES[bin] as usize) < NOTES);
        }
        // The first bin at or above A4 (440 Hz) folds onto pitch class 0.
        let a4_bin = (440.0 * FRAMES as f64 / f64::from(SAMPLE_RATE)).ceil() as usize;
        assert_eq!(BINS_TO_NOTES[a4_bin], 0);
        // One octave up lands on the same class.
        assert_eq!(BINS_TO_NOTES[2 * a4_bin], 0);
    }

    #[test]
    fn pure_tone_concentrates_on_its_pitch_class() {
        // A sine centered exactly on an analysis bin.
        let bin = 100;
        let samples: Vec<i16> = (0..FRAMES)
            .map(|n| {
                let phase = 2.0 * PI * bin as f64 * n as f64 / FRAMES as f64;
                (phase.sin() * 0.5 * 32767.0) as i16
            })
            .collect();

        let mut frame = vec![0.0; FRAMES];
        window::window_i16(&samples, &mut frame).unwrap();
        RealFft::new().forward(&mut frame).unwrap();

        let mut chroma = Chroma::new();
        chroma.feed(&frame);

        let energies = &chroma.note_buffer[..NOTES];
        let total: f64 = energies.iter().sum();
        let target = BINS_TO_NOTES[bin] as usize;
        assert!(total > 0.0);
        assert!(
            energies[target] / total > 0.9,
            "note {target} holds {} of {total}",
            energies[target]
        );
    }

    #[test]
    fn rows_start_after_four_warmup_frames() {
        let spectrum = vec![0.0; FRAMES];
        let mut chroma = Chroma::new();
        for _ in 0..4 {
            chroma.feed(&spectrum);
        }
        assert_eq!(chroma.rows(), 0);

        chroma.feed(&spectrum);
        assert_eq!(chroma.rows(), 1);

        // From here on every frame emits one row.
        for _ in 0..10 {
            chroma.feed(&spectrum);
        }
        assert_eq!(chroma.rows(), 11);
    }

    #[test]
    fn silent_frames_emit_zero_rows() {
        let spectrum = vec![0.0; FRAMES];
        let mut chroma = Chroma::new();
        for _ in 0..6 {
            chroma.feed(&spectrum);
        }
        let (image, rows) = chroma.finish();
        assert_eq!(rows, 2);
        assert!(image.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rows_are_unit_normalized() {
        // Drive the ring with a spectrum that has energy in the band.
        let mut spectrum = vec![0.0; FRAMES];
        spectrum[100] = 3.0;
        spectrum[100 + IM_OFFSET] = 4.0;
        spectrum[700] = 1.0;

        let mut chroma = Chroma::new();
        for _ in 0..5 {
            chroma.feed(&spectrum);
        }
        let (image, rows) = chroma.finish();
        assert_eq!(rows, 1);
        let norm: f64 = image[..NOTES].iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }
}
