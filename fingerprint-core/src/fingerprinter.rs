//! # Streaming Fingerprinter Module
//!
//! The public entry point of the crate: a state machine that accepts
//! mono PCM in arbitrary-sized chunks, windows and transforms complete
//! frames as they become available, and finalizes the accumulated
//! chromagram into the fingerprint string.
//!
//! ## Lifecycle
//! - `Fingerprinter::new()` — empty session, fixed buffers allocated once
//! - `add_samples(..)` — feed PCM; partial frames carry over between calls
//! - `needs_samples()` / `can_calculate()` — progress queries
//! - `calculate_fingerprint()` — consumes the session, returns the result
//!
//! Sessions are independent owned values; any number may run in the same
//! process. Everything is synchronous — a caller abandons a session by
//! dropping it.

use log::debug;

use crate::chroma::Chroma;
use crate::error::{FingerprintError, Result};
use crate::fft::RealFft;
use crate::{Fingerprint, FRAMES, OVERLAP, SAMPLE_RATE, classify, compress, window};

/// Total amount of audio that goes into one fingerprint: 120 seconds.
/// Samples beyond the budget are accepted and silently ignored.
const SAMPLES_NEEDED_TOTAL: usize = SAMPLE_RATE as usize * 120;

/// Fingerprints need a minimum-confidence floor of just over 7 seconds
/// of processed audio before a calculation is worth attempting.
const MIN_SAMPLES_FOR_FINGERPRINT: usize = SAMPLE_RATE as usize * 7;

/// Carry-over scratch size. Chunks below this cannot even service the
/// carry-over path and are rejected outright.
const MIN_CHUNK: usize = FRAMES * 2;

/// A single fingerprinting session.
pub struct Fingerprinter {
    /// Samples consumed so far; advances by [`OVERLAP`] per frame.
    samples_processed: usize,
    /// Frame workspace, overwritten every processed frame.
    frame: Vec<f64>,
    fft: RealFft,
    chroma: Chroma,
    /// Partial-frame samples held over between `add_samples` calls,
    /// never more than one frame's worth.
    carry: Vec<i16>,
    carry_len: usize,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Fingerprinter {
            samples_processed: 0,
            frame: vec![0.0; FRAMES],
            fft: RealFft::new(),
            chroma: Chroma::new(),
            carry: vec![0; MIN_CHUNK],
            carry_len: 0,
        }
    }

    /// Feeds a chunk of mono PCM at [`SAMPLE_RATE`].
    ///
    /// Complete frames are processed immediately, stepping the analysis
    /// window by [`OVERLAP`] samples; whatever is left becomes the
    /// carry-over for the next call. Once the 120-second budget is
    /// reached further samples are accepted and ignored — that is the
    /// design cap, not an error.
    ///
    /// # Returns
    /// * `Err(InsufficientLength)` for chunks shorter than two frames
    pub fn add_samples(&mut self, chunk: &[i16]) -> Result<()> {
        if chunk.len() < MIN_CHUNK {
            return Err(FingerprintError::InsufficientLength);
        }

        let mut offset = 0;

        if self.carry_len > 0 {
            debug_assert!(self.carry_len < FRAMES);
            // Top the scratch up from the head of the chunk so every
            // carried frame reads defined data.
            let top_up = self.carry.len() - self.carry_len;
            self.carry[self.carry_len..].copy_from_slice(&chunk[..top_up]);

            let mut pos = 0;
            let mut remaining = self.carry_len as isize;
            while remaining > 0 {
                if !self.needs_samples() {
                    return Ok(());
                }
                window::window_i16(&self.carry[pos..pos + FRAMES], &mut self.frame)?;
                self.advance()?;
                remaining -= OVERLAP as isize;
                pos += OVERLAP;
            }
            // The carried frames overshot into the chunk; resume there.
            offset = (-remaining) as usize;
            self.carry_len = 0;
        }

        while chunk.len() - offset >= FRAMES {
            if !self.needs_samples() {
                return Ok(());
            }
            window::window_i16(&chunk[offset..offset + FRAMES], &mut self.frame)?;
            self.advance()?;
            offset += OVERLAP;
        }

        let leftover = chunk.len() - offset;
        if leftover > 0 {
            self.carry[..leftover].copy_from_slice(&chunk[offset..]);
            self.carry_len = leftover;
        }
        Ok(())
    }

    /// Transforms the windowed frame and folds it into the chromagram.
    fn advance(&mut self) -> Result<()> {
        self.fft.forward(&mut self.frame)?;
        self.chroma.feed(&self.frame);
        self.samples_processed += OVERLAP;
        Ok(())
    }

    /// True while the session can still make use of more audio.
    pub fn needs_samples(&self) -> bool {
        self.samples_processed + FRAMES - 1 < SAMPLES_NEEDED_TOTAL
    }

    /// True once enough audio has been processed for a meaningful
    /// fingerprint. Calculating earlier is allowed but will usually
    /// fail with `InsufficientLength`.
    pub fn can_calculate(&self) -> bool {
        self.samples_processed > MIN_SAMPLES_FOR_FINGERPRINT
    }

    /// Finalizes the session: integral-image transform, classifier
    /// bank, compression, base64. Consumes the session — the chromagram
    /// cannot be extended once transformed.
    ///
    /// # Returns
    /// * `Err(InsufficientLength)` when fewer than 2 sub-fingerprints
    ///   could be produced
    pub fn calculate_fingerprint(self) -> Result<Fingerprint> {
        let duration = (self.samples_processed / SAMPLE_RATE as usize) as u32;
        let (mut image, rows) = self.chroma.finish();
        classify::integral_image(&mut image, rows);
        let sub_fingerprints = classify::fingerprint(&image, rows)?;
        debug!(
            "finalized fingerprint: {rows} chromagram rows, {} sub-fingerprints, {duration}s of audio",
            sub_fingerprints.len()
        );
        let fingerprint = compress::encode(&sub_fingerprints)?;
        Ok(Fingerprint {
            fingerprint,
            duration,
        })
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}
