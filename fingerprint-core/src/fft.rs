//! # Real FFT Module
//!
//! This module provides the in-place forward FFT over packed real signals
//! that the fingerprinting pipeline runs on every analysis frame.
//!
//! ## Features
//! - Packed-real transform: N real samples processed as N/2 complex pairs
//! - Iterative radix-2 half-size FFT with cached twiddle tables
//! - Even/odd split-and-combine recombination to the full real spectrum
//! - Process-wide trigonometric table cache, built once per size
//!
//! The N real input samples are interpreted as N/2 interleaved complex
//! values (even-indexed samples as real parts, odd-indexed as imaginary
//! parts). After the transform the buffer holds the first half of the
//! real-input spectrum: `buf[k]` is the real part of bin `k` and
//! `buf[N/2 + k]` the imaginary part, for `k < N/2`.

use std::f64::consts::PI;

use once_cell::sync::OnceCell;

use crate::error::{FingerprintError, Result};

/// One cache slot per power-of-two size, indexed by log2(size).
const TABLE_SLOTS: usize = 32;

/// Sine/cosine tables for one transform size, radians = 2π·i/N.
/// Built on first request for that size and immutable afterwards, so
/// they are shared across sessions and threads without locking.
struct TrigTables {
    sin: Vec<f64>,
    cos: Vec<f64>,
}

static TABLES: [OnceCell<TrigTables>; TABLE_SLOTS] = {
    const EMPTY: OnceCell<TrigTables> = OnceCell::new();
    [EMPTY; TABLE_SLOTS]
};

impl TrigTables {
    fn build(n: usize) -> Result<TrigTables> {
        let mut sin = Vec::new();
        let mut cos = Vec::new();
        sin.try_reserve_exact(n)
            .map_err(|_| FingerprintError::AllocationFailed)?;
        cos.try_reserve_exact(n)
            .map_err(|_| FingerprintError::AllocationFailed)?;
        for i in 0..n {
            let angle = 2.0 * PI * i as f64 / n as f64;
            sin.push(angle.sin());
            cos.push(angle.cos());
        }
        Ok(TrigTables { sin, cos })
    }
}

/// Returns the cached tables for half-size `n`, building them on first use.
fn tables_for(n: usize) -> Result<&'static TrigTables> {
    let slot = n.trailing_zeros() as usize;
    TABLES[slot].get_or_try_init(|| TrigTables::build(n))
}

/// Forward FFT engine for packed real signals.
///
/// Each engine owns its split/combine scratch buffer, so independent
/// sessions never share mutable state. The scratch is sized on first use
/// for a given length and reused afterwards; its contents between calls
/// are unspecified.
pub struct RealFft {
    aux: Vec<f64>,
}

impl RealFft {
    pub fn new() -> Self {
        RealFft { aux: Vec::new() }
    }

    /// Transforms `buf` in place.
    ///
    /// `buf.len()` must be a power of two and at least 4; this is a
    /// compile-time-adjacent contract of the pipeline, checked only in
    /// debug builds.
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(AllocationFailed)` if the twiddle tables or the scratch
    ///   buffer could not be allocated; the engine stays usable
    pub fn forward(&mut self, buf: &mut [f64]) -> Result<()> {
        debug_assert!(buf.len() >= 4 && buf.len().is_power_of_two());
        self.ensure_aux(buf.len() * 2)?;
        reorder(buf);
        half_fft(buf)?;
        split(buf, &mut self.aux);
        combine(buf, &self.aux);
        Ok(())
    }

    fn ensure_aux(&mut self, len: usize) -> Result<()> {
        if self.aux.len() < len {
            let grow = len - self.aux.len();
            self.aux
                .try_reserve_exact(grow)
                .map_err(|_| FingerprintError::AllocationFailed)?;
            self.aux.resize(len, 0.0);
        }
        Ok(())
    }
}

impl Default for RealFft {
    fn default() -> Self {
        Self::new()
    }
}

/// Permutes the N/2 complex pairs into bit-reversed order.
fn reorder(buf: &mut [f64]) {
    let pairs = buf.len() >> 1;
    let bits = pairs.trailing_zeros();
    for i in 0..pairs {
        let j = ((i as u32).reverse_bits() >> (32 - bits)) as usize;
        if i < j {
            buf.swap(i << 1, j << 1);
            buf.swap((i << 1) + 1, (j << 1) + 1);
        }
    }
}

/// Iterative radix-2 decimation-in-time FFT over the N/2 complex pairs.
/// Butterfly spans double from 2 up to N/2; twiddles come from the table
/// cache, stride-indexed so every span reuses the same full-size table.
fn half_fft(buf: &mut [f64]) -> Result<()> {
    let n = buf.len() >> 1;
    let tables = tables_for(n)?;

    let mut span = 2;
    while span <= n {
        let half = span >> 1;
        let stride = n / span;

        for base in (0..n).step_by(span) {
            let mut k = 0;
            for j in base..base + half {
                let cos_v = tables.cos[k];
                let sin_v = tables.sin[k];
                let lo = j << 1;
                let hi = (j + half) << 1;
                let t_re = buf[hi] * cos_v + buf[hi + 1] * sin_v;
                let t_im = -buf[hi] * sin_v + buf[hi + 1] * cos_v;
                buf[hi] = buf[lo] - t_re;
                buf[hi + 1] = buf[lo + 1] - t_im;
                buf[lo] += t_re;
                buf[lo + 1] += t_im;
                k += stride;
            }
        }
        span <<= 1;
    }
    Ok(())
}

/// Decomposes the half-size complex spectrum into the spectra of the
/// even- and odd-indexed real subsequences, exploiting conjugate
/// symmetry. Layout in `aux`: even re, even im, odd re, odd im — each
/// block N/2 values long.
fn split(buf: &[f64], aux: &mut [f64]) {
    let n = buf.len() >> 1;
    let half_n = n >> 1;
    let im = n;
    let odd = buf.len();

    aux[0] = buf[0];
    aux[im] = 0.0;
    aux[half_n] = buf[half_n << 1];
    aux[im + half_n] = 0.0;
    aux[odd] = buf[1];
    aux[odd + im] = 0.0;
    aux[odd + half_n] = buf[(half_n << 1) + 1];
    aux[odd + im + half_n] = 0.0;

    for k in 1..n {
        let re = buf[k << 1];
        let im_v = buf[(k << 1) + 1];
        let re_sym = buf[(n - k) << 1];
        let im_sym = buf[((n - k) << 1) + 1];
        aux[k] = (re + re_sym) / 2.0;
        aux[im + k] = (im_v - im_sym) / 2.0;
        aux[odd + k] = (im_v + im_sym) / 2.0;
        aux[odd + im + k] = (re_sym - re) / 2.0;
    }
}

/// Recombines the even/odd spectra into the full real-input spectrum.
/// The per-bin twiddle advances by −2π/N through an angle-addition
/// recurrence instead of per-bin transcendental calls; the recurrence is
/// deliberately never recanonicalized so repeat transforms stay
/// bit-identical.
fn combine(buf: &mut [f64], aux: &[f64]) {
    let n = buf.len() >> 1;
    let im = n;
    let odd = buf.len();

    let a = 2.0 * (-PI / buf.len() as f64).sin().powi(2);
    let b = (-2.0 * PI / buf.len() as f64).sin();
    let mut cos_v = 1.0;
    let mut sin_v = 0.0;

    for k in 0..n {
        let e_re = aux[k];
        let e_im = aux[im + k];
        let o_re = aux[odd + k];
        let o_im = aux[odd + im + k];
        buf[k] = e_re + o_re * cos_v - o_im * sin_v;
        buf[im + k] = e_im + o_re * sin_v + o_im * cos_v;

        let next_cos = cos_v - (a * cos_v + b * sin_v);
        sin_v += b * cos_v - a * sin_v;
        cos_v = next_cos;
    }
}
