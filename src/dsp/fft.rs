//! In-place radix-2 Cooley-Tukey transform over split real/imaginary buffers.
//!
//! The engine only owns read-only tables built in [`FftEngine::new`], so one instance can be
//! shared between threads as long as each caller brings its own scratch buffers.

use std::f64::consts::PI;

use crate::error::{Result, SweepError};

/// Largest supported transform is `2^MAX_LOG2_LEN` points.
pub const MAX_LOG2_LEN: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FftDirection {
    /// `e^{-i}` kernel, unscaled.
    Forward,
    /// `e^{+i}` kernel, scaled by `1/N` so it undoes [`FftDirection::Forward`].
    Inverse,
}

#[derive(Debug)]
pub struct FftEngine {
    len: usize,
    bit_reverse: Vec<usize>,
    // cos/sin of 2*pi*k/len for k in 0..len/2
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
}

impl FftEngine {
    /// Configure tables for a transform of `2^log2_len` points.
    pub fn new(log2_len: u32) -> Result<Self> {
        if log2_len > MAX_LOG2_LEN {
            return Err(SweepError::config(format!(
                "transform size 2^{} exceeds the supported 2^{}",
                log2_len, MAX_LOG2_LEN
            )));
        }

        let len = 1usize << log2_len;
        let shift = usize::BITS - log2_len;
        let bit_reverse = (0..len)
            .map(|i| i.reverse_bits().checked_shr(shift).unwrap_or(0))
            .collect();

        let half = len / 2;
        let mut cos_table = Vec::with_capacity(half);
        let mut sin_table = Vec::with_capacity(half);
        for k in 0..half {
            let angle = 2.0 * PI * k as f64 / len as f64;
            cos_table.push(angle.cos() as f32);
            sin_table.push(angle.sin() as f32);
        }

        Ok(Self {
            len,
            bit_reverse,
            cos_table,
            sin_table,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Transform `real`/`imag` in place. Both must be exactly [`FftEngine::len`] long.
    pub fn run(&self, real: &mut [f32], imag: &mut [f32], direction: FftDirection) -> Result<()> {
        if real.len() != self.len || imag.len() != self.len {
            return Err(SweepError::config(format!(
                "transform of {} points given real/imag buffers of {}/{}",
                self.len,
                real.len(),
                imag.len()
            )));
        }

        for (i, &j) in self.bit_reverse.iter().enumerate() {
            if i < j {
                real.swap(i, j);
                imag.swap(i, j);
            }
        }

        let sign = match direction {
            FftDirection::Forward => -1.0f32,
            FftDirection::Inverse => 1.0f32,
        };

        let mut span = 2;
        while span <= self.len {
            let half = span / 2;
            let stride = self.len / span;

            for start in (0..self.len).step_by(span) {
                for k in 0..half {
                    let wr = self.cos_table[k * stride];
                    let wi = sign * self.sin_table[k * stride];

                    let top = start + k;
                    let bottom = top + half;

                    let tr = wr * real[bottom] - wi * imag[bottom];
                    let ti = wr * imag[bottom] + wi * real[bottom];

                    real[bottom] = real[top] - tr;
                    imag[bottom] = imag[top] - ti;
                    real[top] += tr;
                    imag[top] += ti;
                }
            }

            span <<= 1;
        }

        if direction == FftDirection::Inverse {
            let scale = 1.0 / self.len as f32;
            for (re, im) in real.iter_mut().zip(imag.iter_mut()) {
                *re *= scale;
                *im *= scale;
            }
        }

        Ok(())
    }
}
