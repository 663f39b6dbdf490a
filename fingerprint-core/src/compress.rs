//! # Fingerprint Compression Module
//!
//! Packs a sequence of 32-bit sub-fingerprints into the externally
//! visible fingerprint string, and unpacks such strings back into
//! sub-fingerprints for the matching side.
//!
//! ## Format
//! - Consecutive sub-fingerprints are XOR-delta encoded
//! - Each delta becomes a list of set-bit gap symbols (LSB to MSB,
//!   1-based, terminated by 0)
//! - Pass 1 packs every symbol clipped at 7 into 3 bits; pass 2 packs
//!   `symbol − 7` into 5 bits for the symbols that clipped; each pass is
//!   byte-aligned independently
//! - A 4-byte header (algorithm id, 24-bit big-endian count) prefixes
//!   the packed bytes
//! - The whole buffer is base64 encoded with the URL-safe alphabet and
//!   no padding

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{FingerprintError, Result};

/// Algorithm identifier carried in the header byte.
pub const ALGORITHM: u8 = 1;

/// Largest gap symbol a 32-bit delta can produce (a single bit at the
/// top position), plus the 0 terminator per delta.
const MAX_SYMBOLS_PER_DELTA: usize = 33;

/// Symbols at or above this value spill into the second packing pass.
const PASS_SPLIT: u8 = 7;

/// Compresses sub-fingerprints into the header+payload byte sequence.
///
/// # Returns
/// * `Err(InsufficientLength)` for fewer than 2 sub-fingerprints
pub fn compress(sub_fingerprints: &[u32]) -> Result<Vec<u8>> {
    if sub_fingerprints.len() < 2 {
        return Err(FingerprintError::InsufficientLength);
    }

    let mut symbols = Vec::with_capacity(sub_fingerprints.len() * MAX_SYMBOLS_PER_DELTA);
    push_symbols(sub_fingerprints[0], &mut symbols);
    for pair in sub_fingerprints.windows(2) {
        push_symbols(pair[1] ^ pair[0], &mut symbols);
    }

    let count = sub_fingerprints.len() as u32;
    let mut out = Vec::with_capacity(4 + symbols.len());
    out.push(ALGORITHM);
    out.push((count >> 16) as u8);
    out.push((count >> 8) as u8);
    out.push(count as u8);
    pack_low(&symbols, &mut out);
    pack_high(&symbols, &mut out);
    Ok(out)
}

/// Compresses and base64-encodes in one step: the final fingerprint
/// string.
pub fn encode(sub_fingerprints: &[u32]) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(compress(sub_fingerprints)?))
}

/// Emits the set-bit gap symbols of one delta: for every set bit, the
/// 1-based distance from the previously emitted bit position, then a 0
/// terminator.
fn push_symbols(delta: u32, symbols: &mut Vec<u8>) {
    let mut x = delta;
    let mut bit = 1u8;
    let mut last_bit = 0u8;
    while x != 0 {
        if x & 1 != 0 {
            symbols.push(bit - last_bit);
            last_bit = bit;
        }
        x >>= 1;
        bit += 1;
    }
    symbols.push(0);
}

/// Pass 1: every symbol, clipped at [`PASS_SPLIT`], 3 bits each,
/// LSB-first into a byte-aligned stream.
fn pack_low(symbols: &[u8], out: &mut Vec<u8>) {
    let mut holder = 0u32;
    let mut holder_size = 0u32;
    for &symbol in symbols {
        holder |= u32::from(symbol.min(PASS_SPLIT)) << holder_size;
        holder_size += 3;
        while holder_size >= 8 {
            out.push(holder as u8);
            holder >>= 8;
            holder_size -= 8;
        }
    }
    if holder_size > 0 {
        out.push(holder as u8);
    }
}

/// Pass 2: only the symbols that clipped, as `symbol − 7` in 5 bits
/// each, byte-aligned independently of pass 1.
fn pack_high(symbols: &[u8], out: &mut Vec<u8>) {
    let mut holder = 0u32;
    let mut holder_size = 0u32;
    for &symbol in symbols {
        if symbol < PASS_SPLIT {
            continue;
        }
        holder |= u32::from(symbol - PASS_SPLIT) << holder_size;
        holder_size += 5;
        while holder_size >= 8 {
            out.push(holder as u8);
            holder >>= 8;
            holder_size -= 8;
        }
    }
    if holder_size > 0 {
        out.push(holder as u8);
    }
}

/// Sequential LSB-first bit reader over a byte slice.
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, pos: 0 }
    }

    fn read(&mut self, width: usize) -> Option<u32> {
        if self.pos + width > self.bytes.len() * 8 {
            return None;
        }
        let mut value = 0u32;
        for i in 0..width {
            let at = self.pos + i;
            let bit = (self.bytes[at / 8] >> (at % 8)) & 1;
            value |= u32::from(bit) << i;
        }
        self.pos += width;
        Some(value)
    }

    fn bytes_consumed(&self) -> usize {
        self.pos.div_ceil(8)
    }
}

/// Decodes a fingerprint string back into its sub-fingerprints.
///
/// The exact inverse of [`encode`]: base64 decode, header parse,
/// two-pass symbol unpacking, XOR-undelta.
///
/// # Returns
/// * `Err(MalformedFingerprint)` if the string was not produced by this
///   encoding
pub fn decode(fingerprint: &str) -> Result<Vec<u32>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(fingerprint)
        .map_err(|_| FingerprintError::MalformedFingerprint)?;
    if bytes.len() < 4 || bytes[0] != ALGORITHM {
        return Err(FingerprintError::MalformedFingerprint);
    }
    let count =
        (usize::from(bytes[1]) << 16) | (usize::from(bytes[2]) << 8) | usize::from(bytes[3]);
    if count < 2 {
        return Err(FingerprintError::MalformedFingerprint);
    }
    let payload = &bytes[4..];

    // Pass 1: collect 3-bit symbols until every delta is terminated.
    let mut low = BitReader::new(payload);
    let mut symbols: Vec<u8> = Vec::new();
    let mut terminators = 0usize;
    while terminators < count {
        let symbol = low
            .read(3)
            .ok_or(FingerprintError::MalformedFingerprint)? as u8;
        if symbol == 0 {
            terminators += 1;
        }
        symbols.push(symbol);
    }

    // Pass 2 starts at the next byte boundary after pass 1.
    let mut high = BitReader::new(&payload[low.bytes_consumed()..]);

    let mut values = Vec::with_capacity(count);
    let mut current = 0u32;
    let mut position = 0u32;
    for &symbol in &symbols {
        if symbol == 0 {
            values.push(current);
            current = 0;
            position = 0;
            continue;
        }
        let gap = if symbol == PASS_SPLIT {
            symbol as u32
                + high
                    .read(5)
                    .ok_or(FingerprintError::MalformedFingerprint)?
        } else {
            symbol as u32
        };
        position += gap;
        if position > 32 {
            return Err(FingerprintError::MalformedFingerprint);
        }
        current |= 1 << (position - 1);
    }

    // Undo the XOR-delta chain.
    for i in 1..values.len() {
        let previous = values[i - 1];
        values[i] ^= previous;
    }
    Ok(values)
}
