//! Frame-paced consumer turning spectrum snapshots into a scrolling sweep image.

use super::image::{InputColumn, SpectrogramImage};
use super::sweep::SweepComposer;
use crate::audio::SnapshotBuffer;
use crate::error::{Result, SweepError};

/// Height of the output image before the first tick reveals the real bin count.
pub const STARTER_HEIGHT: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorConfig {
    /// Pixel columns of history kept in the sweep.
    pub sweep_width: usize,
    /// Magnitude that maps to full intensity.
    pub saturation_amplitude: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            sweep_width: 1024,
            saturation_amplitude: 10.0,
        }
    }
}

impl CompositorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sweep_width == 0 {
            return Err(SweepError::config("sweep width must be at least 1"));
        }
        check_saturation(self.saturation_amplitude)
    }
}

fn check_saturation(amplitude: f32) -> Result<()> {
    if !(amplitude.is_finite() && amplitude > 0.0) {
        return Err(SweepError::config(format!(
            "saturation amplitude must be a finite value above 0, got {}",
            amplitude
        )));
    }
    Ok(())
}

pub struct SpectrogramCompositor {
    config: CompositorConfig,
    composer: Box<dyn SweepComposer>,
    output: SpectrogramImage,
    scratch: SpectrogramImage,
    column: InputColumn,
    magnitudes: Vec<f32>,
    ticks: u64,
}

impl SpectrogramCompositor {
    pub fn new(config: CompositorConfig, composer: Box<dyn SweepComposer>) -> Result<Self> {
        config.validate()?;
        log::debug!(
            "Compositor using {} composer, sweep width {}",
            composer.name(),
            config.sweep_width
        );

        Ok(Self {
            config,
            composer,
            output: SpectrogramImage::new(config.sweep_width, STARTER_HEIGHT),
            scratch: SpectrogramImage::new(0, 0),
            column: InputColumn::new(0),
            magnitudes: Vec::new(),
            ticks: 0,
        })
    }

    pub fn config(&self) -> CompositorConfig {
        self.config
    }

    /// The sweep image. Always the same object; its content changes every tick.
    pub fn output(&self) -> &SpectrogramImage {
        &self.output
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Change the history width. Takes effect (and clears the sweep) on the next tick.
    pub fn set_sweep_width(&mut self, sweep_width: usize) -> Result<()> {
        let config = CompositorConfig {
            sweep_width,
            ..self.config
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_saturation_amplitude(&mut self, amplitude: f32) -> Result<()> {
        check_saturation(amplitude)?;
        self.config.saturation_amplitude = amplitude;
        Ok(())
    }

    /// Advance the sweep by one column built from the latest snapshot in `source`.
    pub fn tick(&mut self, source: &SnapshotBuffer) -> Result<()> {
        let bin_count = source.bin_count();

        self.match_output(bin_count);
        self.match_scratch();
        self.match_column(bin_count);

        source.read_into(&mut self.magnitudes)?;
        self.column
            .fill_from_magnitudes(&self.magnitudes, 1.0 / self.config.saturation_amplitude);

        self.composer.upload_column(&self.column)?;
        self.composer
            .compose(&self.output, &self.column, &mut self.scratch)?;

        // Copy back so consumers keep reading the same image
        self.output.copy_from(&self.scratch);
        self.ticks += 1;
        Ok(())
    }

    fn match_output(&mut self, bin_count: usize) {
        let wanted = (self.config.sweep_width, bin_count);
        if self.output.dimensions() != wanted {
            log::debug!(
                "Resizing sweep from {:?} to {:?}; history is discarded",
                self.output.dimensions(),
                wanted
            );
            self.output.reallocate(wanted.0, wanted.1);
        }
    }

    fn match_scratch(&mut self) {
        if self.scratch.dimensions() != self.output.dimensions() {
            log::debug!("Matching scratch image to {:?}", self.output.dimensions());
            self.scratch
                .reallocate(self.output.width(), self.output.height());
        }
    }

    fn match_column(&mut self, bin_count: usize) {
        if self.column.height() != bin_count {
            log::debug!("Matching input column to {} bins", bin_count);
            self.column = InputColumn::new(bin_count);
        }
        if self.magnitudes.len() != bin_count {
            self.magnitudes = vec![0.0; bin_count];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::image::BLANK;
    use crate::render::sweep::CpuSweep;

    fn compositor(width: usize, saturation: f32) -> SpectrogramCompositor {
        SpectrogramCompositor::new(
            CompositorConfig {
                sweep_width: width,
                saturation_amplitude: saturation,
            },
            Box::new(CpuSweep),
        )
        .unwrap()
    }

    fn grey(level: u8) -> [u8; 4] {
        [level, level, level, 255]
    }

    #[test]
    fn three_ticks_read_newest_to_oldest() {
        let source = SnapshotBuffer::new(2);
        let mut compositor = compositor(3, 1.0);

        let columns = [[0.2f32, 0.4], [0.6, 0.8], [1.0, 0.0]];
        for magnitudes in &columns {
            source.publish(magnitudes).unwrap();
            compositor.tick(&source).unwrap();
        }

        let output = compositor.output();
        assert_eq!(output.dimensions(), (3, 2));
        // Leading edge first: C3, C2, C1
        assert_eq!(output.column(0), vec![grey(255), grey(0)]);
        assert_eq!(output.column(1), vec![grey(153), grey(204)]);
        assert_eq!(output.column(2), vec![grey(51), grey(102)]);
        assert_eq!(compositor.ticks(), 3);
    }

    #[test]
    fn normalises_against_saturation_amplitude() {
        let source = SnapshotBuffer::new(3);
        source.publish(&[0.0, 5.0, 50.0]).unwrap();

        let mut compositor = compositor(2, 10.0);
        compositor.tick(&source).unwrap();
        assert_eq!(
            compositor.output().column(0),
            vec![grey(0), grey(128), grey(255)]
        );
    }

    #[test]
    fn unpublished_source_gives_blank_columns() {
        let source = SnapshotBuffer::new(4);
        let mut compositor = compositor(4, 10.0);
        compositor.tick(&source).unwrap();
        compositor.tick(&source).unwrap();

        let output = compositor.output();
        assert_eq!(output.dimensions(), (4, 4));
        assert!(output.pixels().iter().all(|&p| p == BLANK));
    }

    #[test]
    fn starts_with_placeholder_height() {
        let compositor = compositor(16, 1.0);
        assert_eq!(compositor.output().dimensions(), (16, STARTER_HEIGHT));
    }

    #[test]
    fn width_change_starts_a_fresh_sweep() {
        let source = SnapshotBuffer::new(2);
        source.publish(&[1.0, 1.0]).unwrap();

        let mut compositor = compositor(3, 1.0);
        compositor.tick(&source).unwrap();
        compositor.tick(&source).unwrap();

        compositor.set_sweep_width(5).unwrap();
        source.publish(&[0.0, 0.0]).unwrap();
        compositor.tick(&source).unwrap();

        let output = compositor.output();
        assert_eq!(output.dimensions(), (5, 2));
        // Nothing from before the resize survives
        assert!(output.pixels().iter().all(|&p| p == BLANK));
    }

    #[test]
    fn bin_count_change_starts_a_fresh_sweep() {
        let mut compositor = compositor(3, 1.0);

        let small = SnapshotBuffer::new(2);
        small.publish(&[1.0, 1.0]).unwrap();
        compositor.tick(&small).unwrap();

        let large = SnapshotBuffer::new(8);
        compositor.tick(&large).unwrap();

        let output = compositor.output();
        assert_eq!(output.dimensions(), (3, 8));
        assert!(output.pixels().iter().all(|&p| p == BLANK));
    }

    #[test]
    fn output_storage_is_stable_between_resizes() {
        let source = SnapshotBuffer::new(4);
        let mut compositor = compositor(8, 1.0);
        compositor.tick(&source).unwrap();

        let before = compositor.output().pixels().as_ptr();
        for level in 0..5 {
            source.publish(&[level as f32 / 5.0; 4]).unwrap();
            compositor.tick(&source).unwrap();
        }
        assert_eq!(compositor.output().pixels().as_ptr(), before);
    }

    #[test]
    fn rejects_bad_configuration() {
        for saturation in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let result = SpectrogramCompositor::new(
                CompositorConfig {
                    sweep_width: 4,
                    saturation_amplitude: saturation,
                },
                Box::new(CpuSweep),
            );
            assert!(matches!(result, Err(SweepError::Configuration(_))));
        }

        let mut compositor = compositor(4, 1.0);
        assert!(compositor.set_sweep_width(0).is_err());
        assert!(compositor.set_saturation_amplitude(0.0).is_err());
        assert_eq!(compositor.config().sweep_width, 4);
        assert_eq!(compositor.config().saturation_amplitude, 1.0);
    }
}
