use rayon::prelude::*;

use super::image::{InputColumn, SpectrogramImage};
use crate::error::{Result, SweepError};

/// Shift-and-insert collaborator used by the compositor.
///
/// `compose` must write into `next` the content of `previous` moved one column toward the
/// trailing edge, with `column` in column 0 and the old trailing column gone.
pub trait SweepComposer: Send {
    fn name(&self) -> &'static str;

    /// Hand the freshly built column to the backend before composing.
    fn upload_column(&mut self, column: &InputColumn) -> Result<()>;

    fn compose(
        &mut self,
        previous: &SpectrogramImage,
        column: &InputColumn,
        next: &mut SpectrogramImage,
    ) -> Result<()>;
}

/// Check the shape contract shared by every composer.
pub fn check_shapes(
    previous: &SpectrogramImage,
    column: &InputColumn,
    next: &SpectrogramImage,
) -> Result<()> {
    if next.dimensions() != previous.dimensions() {
        return Err(SweepError::SizeMismatch {
            what: "composition target pixels",
            expected: previous.width() * previous.height(),
            actual: next.width() * next.height(),
        });
    }
    if column.height() != previous.height() {
        return Err(SweepError::SizeMismatch {
            what: "input column height",
            expected: previous.height(),
            actual: column.height(),
        });
    }
    Ok(())
}

/// Composer that shifts rows on the CPU, one rayon task per row.
#[derive(Debug, Default)]
pub struct CpuSweep;

impl SweepComposer for CpuSweep {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn upload_column(&mut self, _column: &InputColumn) -> Result<()> {
        // The column is read straight from host memory in compose
        Ok(())
    }

    fn compose(
        &mut self,
        previous: &SpectrogramImage,
        column: &InputColumn,
        next: &mut SpectrogramImage,
    ) -> Result<()> {
        check_shapes(previous, column, next)?;

        let width = previous.width();
        if width == 0 {
            return Ok(());
        }

        next.pixels_mut()
            .par_chunks_exact_mut(width)
            .zip(previous.pixels().par_chunks_exact(width))
            .zip(column.pixels().par_iter())
            .for_each(|((next_row, previous_row), &pixel)| {
                next_row[0] = pixel;
                next_row[1..].copy_from_slice(&previous_row[..width - 1]);
            });

        Ok(())
    }
}
