use serde::Deserialize;
use std::f64::consts::PI;

use crate::error::{Result, SweepError};

// Four-term Blackman-Harris cosine-sum coefficients.
const BLACKMAN_HARRIS: [f64; 4] = [0.35875, -0.48829, 0.14128, -0.01168];

/// Tapering applied to a block before it is transformed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    #[default]
    BlackmanHarris,
    /// No tapering; every coefficient is 1.0.
    Rectangular,
}

impl WindowKind {
    /// Build the coefficient table for a block of `sample_count` samples.
    pub fn build(self, sample_count: usize) -> Result<Vec<f32>> {
        if sample_count < 2 {
            return Err(SweepError::config(format!(
                "window needs at least 2 samples, got {}",
                sample_count
            )));
        }

        Ok(match self {
            WindowKind::BlackmanHarris => blackman_harris(sample_count),
            WindowKind::Rectangular => vec![1.0; sample_count],
        })
    }
}

fn blackman_harris(sample_count: usize) -> Vec<f32> {
    let [a0, a1, a2, a3] = BLACKMAN_HARRIS;
    let denom = (sample_count - 1) as f64;

    (0..sample_count)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / denom;
            (a0 + a1 * theta.cos() + a2 * (2.0 * theta).cos() + a3 * (3.0 * theta).cos()) as f32
        })
        .collect()
}
