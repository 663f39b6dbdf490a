// fingerprint-core/src/lib.rs

//! The core logic for the acoustic fingerprinting engine.
//! This crate turns a stream of decoded PCM audio into a compact,
//! comparable fingerprint string following the Chromaprint/AcoustID
//! design: a real-valued FFT, a chroma (pitch-class) feature extractor,
//! a classifier bank over an integral image of the chromagram, and a
//! delta+base64 compressor. It is completely headless and contains no
//! decoding, resampling or I/O code — callers hand it mono PCM at
//! [`SAMPLE_RATE`] and receive a [`Fingerprint`] back.

pub mod chroma;
pub mod classify;
pub mod compress;
pub mod error;
pub mod fft;
pub mod fingerprinter;
pub mod window;

pub use error::{FingerprintError, Result};
pub use fingerprinter::Fingerprinter;

use serde::{Deserialize, Serialize};

/// Sample rate the analysis constants are calibrated for. Audio at any
/// other rate must be resampled before it is handed to the fingerprinter.
pub const SAMPLE_RATE: u32 = 11025;

/// Samples per analysis frame (one FFT input).
pub const FRAMES: usize = 4096;

/// New samples consumed between successive frames; frames overlap by
/// `FRAMES - OVERLAP`.
pub const OVERLAP: usize = 1365;

/// Number of pitch classes in one chromagram row.
pub const NOTES: usize = 12;

/// Represents the result of a completed fingerprinting session.
// Serde derives so the result can be posted as-is to an AcoustID-style
// lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// The compressed fingerprint, base64 encoded (URL-safe alphabet,
    /// no padding).
    pub fingerprint: String,
    /// Seconds of audio that went into the fingerprint.
    pub duration: u32,
}
