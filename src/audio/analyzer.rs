//! Real-time spectrum producer.
//!
//! One [`SpectrumAnalyzer::analyze`] call per audio block: pull one channel out of the
//! interleaved block, taper it, transform it and publish the first half of the magnitude
//! spectrum. Once `Ready`, the call performs no allocation and takes the snapshot lock only
//! for the final copy.

use std::sync::Arc;

use super::snapshot::SnapshotBuffer;
use crate::dsp::{FftDirection, FftEngine, WindowKind};
use crate::error::{Result, SweepError};

/// Per-session buffers, allocated once in [`SpectrumAnalyzer::init`].
#[derive(Debug)]
struct Ready {
    block_length: usize,
    fft: FftEngine,
    window: Vec<f32>,
    // Workspace reused every block; holds nothing meaningful between calls.
    real: Vec<f32>,
    imag: Vec<f32>,
    snapshot: Arc<SnapshotBuffer>,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Uninitialized,
    Ready(Box<Ready>),
    Disposed,
}

#[derive(Debug, Default)]
pub struct SpectrumAnalyzer {
    state: State,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure for blocks of `block_length` frames with a Blackman-Harris taper.
    pub fn init(&mut self, block_length: usize) -> Result<()> {
        self.init_with_window(block_length, WindowKind::BlackmanHarris)
    }

    /// Configure for blocks of `block_length` frames with the given taper.
    ///
    /// Calling this on a ready analyzer starts a new session: buffers and the snapshot
    /// buffer are replaced, so readers must fetch [`SpectrumAnalyzer::snapshot_buffer`] again.
    pub fn init_with_window(&mut self, block_length: usize, window: WindowKind) -> Result<()> {
        if matches!(self.state, State::Disposed) {
            return Err(SweepError::InvalidState("analyzer has been disposed"));
        }
        if block_length < 2 || !block_length.is_power_of_two() {
            return Err(SweepError::config(format!(
                "block length must be a power of two of at least 2, got {}",
                block_length
            )));
        }

        let fft = FftEngine::new(block_length.trailing_zeros())?;
        let window = window.build(block_length)?;

        self.state = State::Ready(Box::new(Ready {
            block_length,
            fft,
            window,
            real: vec![0.0; block_length],
            imag: vec![0.0; block_length],
            snapshot: Arc::new(SnapshotBuffer::new(block_length / 2)),
        }));

        Ok(())
    }

    /// Release every buffer. The analyzer cannot be used afterwards.
    pub fn dispose(&mut self) {
        self.state = State::Disposed;
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Frames per block, or 0 when not ready.
    pub fn block_length(&self) -> usize {
        match &self.state {
            State::Ready(ready) => ready.block_length,
            _ => 0,
        }
    }

    /// Frequency bins per snapshot (`block_length / 2`), or 0 when not ready.
    pub fn bin_count(&self) -> usize {
        self.block_length() / 2
    }

    /// Shared handle to the snapshot buffer for a consumer on another thread.
    pub fn snapshot_buffer(&self) -> Result<Arc<SnapshotBuffer>> {
        Ok(Arc::clone(&self.ready()?.snapshot))
    }

    /// Analyze one interleaved block and publish its magnitude spectrum.
    ///
    /// Only the first `block_length` frames of `block` are used; a longer block is fine, a
    /// shorter one is a size mismatch.
    pub fn analyze(
        &mut self,
        block: &[f32],
        channel_index: usize,
        channel_count: usize,
    ) -> Result<()> {
        let ready = self.ready_mut()?;
        let n = ready.block_length;

        if channel_count == 0 || channel_index >= channel_count {
            return Err(SweepError::config(format!(
                "channel index {} out of range for {} channels",
                channel_index, channel_count
            )));
        }
        let required = (n - 1)
            .checked_mul(channel_count)
            .and_then(|span| span.checked_add(channel_index + 1))
            .ok_or_else(|| {
                SweepError::config(format!(
                    "{} channels of {} frames exceed the addressable block size",
                    channel_count, n
                ))
            })?;
        if block.len() < required {
            return Err(SweepError::SizeMismatch {
                what: "audio block",
                expected: required,
                actual: block.len(),
            });
        }

        for (dst, &src) in ready
            .real
            .iter_mut()
            .zip(block[channel_index..].iter().step_by(channel_count))
        {
            *dst = src;
        }

        for (sample, &coefficient) in ready.real.iter_mut().zip(&ready.window) {
            *sample *= coefficient;
        }

        ready.imag.fill(0.0);

        ready
            .fft
            .run(&mut ready.real, &mut ready.imag, FftDirection::Forward)?;

        // The upper half mirrors the lower half for real input
        let half = n / 2;
        for (re, &im) in ready.real[..half].iter_mut().zip(&ready.imag[..half]) {
            *re = (*re * *re + im * im).sqrt();
        }

        ready.snapshot.publish(&ready.real[..half])
    }

    /// Copy the latest published spectrum into `dest`, which must hold exactly
    /// [`SpectrumAnalyzer::bin_count`] values.
    pub fn latest_snapshot(&self, dest: &mut [f32]) -> Result<()> {
        self.ready()?.snapshot.read_into(dest)
    }

    fn ready(&self) -> Result<&Ready> {
        match &self.state {
            State::Ready(ready) => Ok(&**ready),
            State::Uninitialized => Err(SweepError::InvalidState("analyzer is not initialized")),
            State::Disposed => Err(SweepError::InvalidState("analyzer has been disposed")),
        }
    }

    fn ready_mut(&mut self) -> Result<&mut Ready> {
        match &mut self.state {
            State::Ready(ready) => Ok(&mut **ready),
            State::Uninitialized => Err(SweepError::InvalidState("analyzer is not initialized")),
            State::Disposed => Err(SweepError::InvalidState("analyzer has been disposed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(n: usize, window: WindowKind) -> SpectrumAnalyzer {
        let mut analyzer = SpectrumAnalyzer::new();
        analyzer.init_with_window(n, window).unwrap();
        analyzer
    }

    fn latest(analyzer: &SpectrumAnalyzer) -> Vec<f32> {
        let mut out = vec![0.0; analyzer.bin_count()];
        analyzer.latest_snapshot(&mut out).unwrap();
        out
    }

    #[test]
    fn calls_before_init_are_invalid_state() {
        let mut analyzer = SpectrumAnalyzer::new();
        assert!(!analyzer.is_ready());
        assert!(matches!(
            analyzer.analyze(&[0.0; 8], 0, 1),
            Err(SweepError::InvalidState(_))
        ));
        assert!(matches!(
            analyzer.latest_snapshot(&mut [0.0; 4]),
            Err(SweepError::InvalidState(_))
        ));
        assert!(analyzer.snapshot_buffer().is_err());
        assert_eq!(analyzer.bin_count(), 0);
    }

    #[test]
    fn init_rejects_non_power_of_two() {
        let mut analyzer = SpectrumAnalyzer::new();
        for n in [0usize, 1, 3, 12, 1000] {
            assert!(matches!(
                analyzer.init(n),
                Err(SweepError::Configuration(_))
            ));
        }
        assert!(!analyzer.is_ready());

        analyzer.init(1024).unwrap();
        assert_eq!(analyzer.bin_count(), 512);
    }

    #[test]
    fn silence_gives_zero_spectrum() {
        let mut analyzer = ready(8, WindowKind::BlackmanHarris);
        analyzer.analyze(&[0.0; 16], 1, 2).unwrap();
        assert_eq!(latest(&analyzer), vec![0.0; 4]);
    }

    #[test]
    fn unwindowed_impulse_is_flat() {
        let mut analyzer = ready(8, WindowKind::Rectangular);
        analyzer
            .analyze(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 0, 1)
            .unwrap();

        let spectrum = latest(&analyzer);
        assert_eq!(spectrum.len(), 4);
        for bin in spectrum {
            assert!((bin - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn magnitudes_are_non_negative() {
        let mut analyzer = ready(256, WindowKind::BlackmanHarris);
        let block: Vec<f32> = (0..512)
            .map(|i| ((i * 37 % 101) as f32 / 50.0 - 1.0) * if i % 3 == 0 { -1.0 } else { 1.0 })
            .collect();
        analyzer.analyze(&block, 0, 2).unwrap();
        assert!(latest(&analyzer).iter().all(|&m| m >= 0.0));
    }

    #[test]
    fn selects_the_requested_channel() {
        let n = 64;
        let bin = 8;
        // Channel 1 carries a sine, channels 0 and 2 are silent
        let mut block = vec![0.0f32; n * 3];
        for frame in 0..n {
            block[frame * 3 + 1] =
                (2.0 * std::f32::consts::PI * bin as f32 * frame as f32 / n as f32).sin();
        }

        let mut analyzer = ready(n, WindowKind::BlackmanHarris);
        analyzer.analyze(&block, 0, 3).unwrap();
        assert!(latest(&analyzer).iter().all(|&m| m == 0.0));

        analyzer.analyze(&block, 1, 3).unwrap();
        let spectrum = latest(&analyzer);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
    }

    #[test]
    fn short_block_is_size_mismatch() {
        let mut analyzer = ready(8, WindowKind::BlackmanHarris);
        // channel 1 of 2 needs 1 + 7 * 2 + 1 = 16 samples
        assert!(matches!(
            analyzer.analyze(&[0.0; 15], 1, 2),
            Err(SweepError::SizeMismatch {
                expected: 16,
                actual: 15,
                ..
            })
        ));
        // channel 0 gets by with one sample less
        analyzer.analyze(&[0.0; 15], 0, 2).unwrap();
    }

    #[test]
    fn oversized_channel_layout_is_an_error() {
        let mut analyzer = ready(8, WindowKind::BlackmanHarris);
        assert!(matches!(
            analyzer.analyze(&[0.0; 8], 0, usize::MAX / 2),
            Err(SweepError::Configuration(_))
        ));
        assert!(matches!(
            analyzer.analyze(&[0.0; 8], usize::MAX - 1, usize::MAX),
            Err(SweepError::Configuration(_))
        ));
        // Nothing was published
        let mut latest = vec![1.0; 4];
        analyzer.latest_snapshot(&mut latest).unwrap();
        assert!(latest.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn bad_channel_layout_is_rejected() {
        let mut analyzer = ready(8, WindowKind::BlackmanHarris);
        assert!(analyzer.analyze(&[0.0; 16], 2, 2).is_err());
        assert!(analyzer.analyze(&[0.0; 16], 0, 0).is_err());
    }

    #[test]
    fn snapshot_buffer_sees_publishes() {
        let mut analyzer = ready(8, WindowKind::Rectangular);
        let buffer = analyzer.snapshot_buffer().unwrap();
        assert_eq!(buffer.bin_count(), 4);

        analyzer.analyze(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 0, 1).unwrap();
        let mut out = [0.0; 4];
        buffer.read_into(&mut out).unwrap();
        assert!(out.iter().all(|&m| (m - 1.0).abs() < 1e-6));
    }

    #[test]
    fn wrong_destination_length_fails() {
        let analyzer = ready(8, WindowKind::BlackmanHarris);
        let mut out = [3.0; 5];
        assert!(matches!(
            analyzer.latest_snapshot(&mut out),
            Err(SweepError::SizeMismatch { .. })
        ));
        assert_eq!(out, [3.0; 5]);
    }

    #[test]
    fn disposed_analyzer_stays_unusable() {
        let mut analyzer = ready(8, WindowKind::BlackmanHarris);
        analyzer.dispose();
        assert!(matches!(
            analyzer.analyze(&[0.0; 8], 0, 1),
            Err(SweepError::InvalidState(_))
        ));
        assert!(analyzer.init(8).is_err());
    }
}
