//! Real-time spectrum analysis and a scrolling spectrogram compositor.
//!
//! The producer side ([`audio::SpectrumAnalyzer`]) turns blocks of interleaved audio into
//! magnitude spectra and publishes them to a [`audio::SnapshotBuffer`]. The consumer side
//! ([`render::SpectrogramCompositor`]) reads the latest snapshot once per frame and shifts it
//! into a sweep image.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod encode;
pub mod error;
pub mod host;
pub mod render;

pub use error::{Result, SweepError};
