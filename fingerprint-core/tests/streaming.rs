//! End-to-end tests for the streaming fingerprinting pipeline.
//!
//! These exercise the same code path an embedding application drives:
//! arbitrary-sized PCM chunks in, one base64 fingerprint string out.

use std::f64::consts::PI;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use fingerprint_core::{
    FingerprintError, Fingerprinter, SAMPLE_RATE, compress,
};

/// Deterministic sine-mixture test signal, loud enough to clear the
/// chroma silence floor.
fn tonal_signal(seconds: usize) -> Vec<i16> {
    let n = SAMPLE_RATE as usize * seconds;
    (0..n)
        .map(|i| {
            let t = i as f64 / f64::from(SAMPLE_RATE);
            let sample = 0.5 * (2.0 * PI * 440.0 * t).sin()
                + 0.25 * (2.0 * PI * 660.0 * t).sin()
                + 0.125 * (2.0 * PI * 220.0 * t).cos();
            (sample * 20000.0) as i16
        })
        .collect()
}

#[test]
fn chunked_and_oneshot_streams_fingerprint_identically() {
    let signal = tonal_signal(12);

    let mut oneshot = Fingerprinter::new();
    oneshot.add_samples(&signal).unwrap();
    let expected = oneshot.calculate_fingerprint().unwrap();

    // Same stream, fed as uneven chunks (each at least the minimum).
    let mut chunked = Fingerprinter::new();
    let mut offset = 0;
    for &size in [9000usize, 8192, 13000, 8500].iter().cycle() {
        let remaining = signal.len() - offset;
        if remaining < 2 * size {
            chunked.add_samples(&signal[offset..]).unwrap();
            break;
        }
        chunked.add_samples(&signal[offset..offset + size]).unwrap();
        offset += size;
    }
    let actual = chunked.calculate_fingerprint().unwrap();

    assert_eq!(actual, expected);
}

#[test]
fn independent_sessions_agree() {
    let signal = tonal_signal(10);

    let mut a = Fingerprinter::new();
    let mut b = Fingerprinter::new();
    a.add_samples(&signal).unwrap();
    b.add_samples(&signal).unwrap();

    assert_eq!(
        a.calculate_fingerprint().unwrap(),
        b.calculate_fingerprint().unwrap()
    );
}

#[test]
fn silent_stream_caps_at_the_budget() {
    // 125 seconds of silence: 5 seconds beyond the 120-second budget.
    let signal = vec![0i16; SAMPLE_RATE as usize * 125];

    let mut session = Fingerprinter::new();
    session.add_samples(&signal).unwrap();
    assert!(!session.needs_samples());
    assert!(session.can_calculate());

    // Extra audio past the budget is accepted and ignored.
    session.add_samples(&signal[..20000]).unwrap();

    let result = session.calculate_fingerprint().unwrap();
    assert_eq!(result.duration, 119); // 966 full overlap steps < 120 s

    // The string is non-empty URL-safe base64 throughout.
    assert!(!result.fingerprint.is_empty());
    assert!(
        result
            .fingerprint
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );

    // Header: algorithm id 1, row count capped by the budget. At the
    // budget 967 frames are processed; 4 warm the filter ring up and a
    // 16-row classifier window slides over the 963 emitted rows.
    let bytes = URL_SAFE_NO_PAD.decode(&result.fingerprint).unwrap();
    assert_eq!(bytes[0], 1);
    let count = (usize::from(bytes[1]) << 16)
        | (usize::from(bytes[2]) << 8)
        | usize::from(bytes[3]);
    assert_eq!(count, 948);

    // Every chromagram row was silent, so every sub-fingerprint is the
    // same value and the fingerprint decodes back to 948 of them.
    let subs = compress::decode(&result.fingerprint).unwrap();
    assert_eq!(subs.len(), 948);
    assert!(subs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn decoded_fingerprint_matches_streamed_sub_fingerprints() {
    let signal = tonal_signal(15);
    let mut session = Fingerprinter::new();
    session.add_samples(&signal).unwrap();
    let result = session.calculate_fingerprint().unwrap();

    let subs = compress::decode(&result.fingerprint).unwrap();
    // 15 s → 119 frames → 115 rows → 100 classifier windows.
    assert_eq!(subs.len(), 100);
    // A tonal stream must produce non-degenerate sub-fingerprints.
    assert!(subs.windows(2).any(|pair| pair[0] != pair[1]));
}

#[test]
fn short_chunks_and_short_sessions_error_cleanly() {
    let mut session = Fingerprinter::new();
    assert_eq!(
        session.add_samples(&[0i16; 4096]),
        Err(FingerprintError::InsufficientLength)
    );

    // Under 17 chromagram rows there is nothing to fingerprint.
    session.add_samples(&tonal_signal(2)).unwrap();
    assert!(!session.can_calculate());
    assert_eq!(
        session.calculate_fingerprint(),
        Err(FingerprintError::InsufficientLength)
    );
}

#[test]
fn fingerprint_result_serializes_for_submission() {
    let mut session = Fingerprinter::new();
    session.add_samples(&tonal_signal(10)).unwrap();
    let result = session.calculate_fingerprint().unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["duration"].as_u64(), Some(u64::from(result.duration)));
    assert_eq!(
        json["fingerprint"].as_str(),
        Some(result.fingerprint.as_str())
    );
}
