//! Error types shared by the fingerprinting pipeline.

use thiserror::Error;

/// Errors surfaced by the public fingerprinting API.
///
/// Every kind is a recoverable return value: a caller may feed more
/// audio and retry, or abandon the session. Nothing in this crate
/// panics on malformed runtime input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FingerprintError {
    /// A trigonometric table or FFT scratch buffer could not be
    /// allocated. The session stays valid; the call may be retried.
    #[error("could not allocate FFT tables or scratch memory")]
    AllocationFailed,

    /// Fewer samples than the minimum chunk size were supplied, or the
    /// session has not accumulated enough chromagram rows to produce a
    /// fingerprint.
    #[error("not enough audio for this operation")]
    InsufficientLength,

    /// The windower was handed a block whose length is not exactly one
    /// frame. This indicates a caller bug, not a runtime condition.
    #[error("frame windower requires exactly one frame of samples")]
    InvalidFrameLength,

    /// A fingerprint string handed to the decoder was not produced by
    /// this encoding (bad base64, truncated packing, or a bogus header).
    #[error("malformed fingerprint string")]
    MalformedFingerprint,
}

/// Convenience alias so callers can write `Result<T>` instead of
/// `Result<T, FingerprintError>`.
pub type Result<T> = std::result::Result<T, FingerprintError>;
