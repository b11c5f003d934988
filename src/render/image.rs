//! CPU-side pixel containers for the sweep.
//!
//! Pixels are RGBA8. In a [`SpectrogramImage`] row `y` holds frequency bin `y` and column 0 is
//! the leading (newest) edge of the sweep.

pub type Rgba = [u8; 4];

pub const BLANK: Rgba = [0, 0, 0, 255];

/// Grey level for a normalised amplitude, fully opaque.
pub fn intensity_to_rgba(intensity: f32) -> Rgba {
    let level = (intensity.clamp(0.0, 1.0) * 255.0).round() as u8;
    [level, level, level, 255]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpectrogramImage {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl SpectrogramImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![BLANK; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * self.width + x]
    }

    /// Column `x`, bin 0 first.
    pub fn column(&self, x: usize) -> Vec<Rgba> {
        (0..self.height).map(|y| self.pixel(x, y)).collect()
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, Rgba> {
        self.pixels.chunks_exact(self.width.max(1))
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba] {
        &mut self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.pixels)
    }

    /// Discard the content and reallocate as a blank `width` x `height` image.
    pub fn reallocate(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pixels = vec![BLANK; width * height];
    }

    /// Overwrite this image with `other`, keeping the existing allocation when the sizes agree.
    pub fn copy_from(&mut self, other: &SpectrogramImage) {
        self.width = other.width;
        self.height = other.height;
        self.pixels.clone_from(&other.pixels);
    }
}

/// One column's worth of pixels, bin 0 first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputColumn {
    pixels: Vec<Rgba>,
}

impl InputColumn {
    pub fn new(height: usize) -> Self {
        Self {
            pixels: vec![BLANK; height],
        }
    }

    pub fn from_pixels(pixels: Vec<Rgba>) -> Self {
        Self { pixels }
    }

    pub fn height(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Map magnitudes to grey levels, saturating at `1 / scale`.
    pub fn fill_from_magnitudes(&mut self, magnitudes: &[f32], scale: f32) {
        for (pixel, &magnitude) in self.pixels.iter_mut().zip(magnitudes) {
            *pixel = intensity_to_rgba(magnitude * scale);
        }
    }
}
